//! The resource object model: body content plus named property families.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::record::FileInfo;

/// A stored entity identified by a hierarchical, extension-less key.
///
/// A resource carries named *property families*: string key/value maps. The
/// default family holds ordinary properties, including the designated content
/// field with the body text. Version/status metadata (the system family) is
/// carried as a typed [`FileInfo`] stamped from the statistics index at load
/// time; it is not part of the serialized form.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    key: String,
    info: FileInfo,
    families: BTreeMap<String, BTreeMap<String, String>>,
}

impl Resource {
    /// Name of the family holding version/status metadata.
    pub const SYSTEM_FAMILY: &'static str = "sys";
    /// Name of the default property family.
    pub const DEFAULT_FAMILY: &'static str = "properties";
    /// Key of the body field inside the default family.
    pub const CONTENT_FIELD: &'static str = "description";

    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
    }

    /// Version/status metadata for this resource.
    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut FileInfo {
        &mut self.info
    }

    pub fn set_info(&mut self, info: FileInfo) {
        self.info = info;
    }

    /// The body text, or the empty string when none has been set.
    pub fn content(&self) -> &str {
        self.property(Self::CONTENT_FIELD).unwrap_or("")
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.set_property(Self::CONTENT_FIELD, content);
    }

    /// A property from the default family.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.families
            .get(Self::DEFAULT_FAMILY)
            .and_then(|family| family.get(key))
            .map(String::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.family_mut(Self::DEFAULT_FAMILY)
            .insert(key.into(), value.into());
    }

    /// All property families, keyed by family name.
    pub fn families(&self) -> &BTreeMap<String, BTreeMap<String, String>> {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.families.get(name)
    }

    /// The named family, created empty when absent.
    pub fn family_mut(&mut self, name: &str) -> &mut BTreeMap<String, String> {
        self.families.entry(name.to_string()).or_default()
    }

    pub fn set_family_property(
        &mut self,
        family: &str,
        key: impl Into<String>,
        value: impl Into<String>,
    ) {
        self.family_mut(family).insert(key.into(), value.into());
    }
}
