//! Foundation types for the quire content store.
//!
//! This crate provides the version, change-record, and resource types used
//! throughout the quire system. Every other quire crate depends on
//! `quire-types`.
//!
//! # Key Types
//!
//! - [`Version`] — An immutable commit identity (id, timestamp, author)
//! - [`FileInfo`] — Per-path created/updated/deleted summary with its merge policy
//! - [`ChangeStatus`] — Kind of change recorded for a path in one commit
//! - [`Resource`] — A stored entity: body content plus named property families
//! - [`normalize_path`] — Canonical form for resource keys and file paths

pub mod key;
pub mod record;
pub mod resource;
pub mod version;

pub use key::normalize_path;
pub use record::{ChangeStatus, FileInfo};
pub use resource::Resource;
pub use version::Version;
