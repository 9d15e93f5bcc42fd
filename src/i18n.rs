//! Localization of status labels.
//!
//! Keys are the raw labels received on the wire (`uploading`, `disk_full`,
//! ...). A missing translation falls back to the key itself.

use crate::error::Result;
use std::collections::HashMap;
use std::path::Path;

pub trait Translate: Send + Sync {
    fn translate(&self, key: &str) -> Option<String>;
}

/// Translator that knows no keys
#[derive(Debug, Default, Clone, Copy)]
pub struct Untranslated;

impl Translate for Untranslated {
    fn translate(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Flat key -> text catalog, loaded from a JSON object
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entries: HashMap<String, String>,
}

impl Catalog {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(json)?;
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Translate for Catalog {
    fn translate(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

/// Translated text for `key`, or `key` itself
pub fn localize(translator: &dyn Translate, key: &str) -> String {
    translator
        .translate(key)
        .unwrap_or_else(|| key.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_lookup() {
        let catalog =
            Catalog::from_json_str(r#"{"uploading": "Uploading", "complete": "Done"}"#).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(localize(&catalog, "uploading"), "Uploading");
        assert_eq!(localize(&catalog, "disk_full"), "disk_full");
    }

    #[test]
    fn test_untranslated_falls_back() {
        assert_eq!(localize(&Untranslated, "extracting"), "extracting");
    }

    #[test]
    fn test_catalog_rejects_non_object() {
        assert!(Catalog::from_json_str("[1, 2]").is_err());
    }

    #[test]
    fn test_catalog_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("en.json");
        std::fs::write(&path, r#"{"archiving": "Packing"}"#).unwrap();

        let catalog = Catalog::load(&path).unwrap();
        assert_eq!(catalog.translate("archiving").as_deref(), Some("Packing"));
    }
}
