//! Text codecs for the quire content store.
//!
//! Three small, pure subsystems:
//!
//! - [`PathEncoder`] — reversible escaping of arbitrary strings into a
//!   constrained character set, so any key is safe as a single path segment
//! - [`serialize_resource`] / [`deserialize_resource`] — the hybrid resource
//!   text format: body, a dash separator, and a flat `key: value` block with
//!   dotted keys for non-default property families
//! - [`to_file_path`] / [`to_resource_key`] — the mapping between logical
//!   resource keys and physical file paths, inserting and stripping the
//!   per-directory index file name

pub mod content;
pub mod error;
pub mod escape;
pub mod paths;

pub use content::{deserialize_resource, serialize_resource};
pub use error::{CodecError, CodecResult};
pub use escape::PathEncoder;
pub use paths::{to_file_path, to_resource_key};
