use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::TemplateError;
use crate::tokens;

/// Named token strings. Path and filename templates are kept in separate
/// stores; both editors use the same operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TemplateStore {
    templates: BTreeMap<String, String>,
}

impl TemplateStore {
    pub fn new() -> Self {
        Self {
            templates: BTreeMap::new(),
        }
    }

    pub fn default_paths() -> Self {
        Self::from_pairs(&[
            ("YYYY/YYYY-MM-DD", "{YYYY}/{YYYY}-{MM}-{DD}"),
            ("YYYY/YYYY-MM", "{YYYY}/{YYYY}-{MM}"),
            ("YYYY/MM/DD", "{YYYY}/{MM}/{DD}"),
        ])
    }

    pub fn default_filenames() -> Self {
        Self::from_pairs(&[
            ("Original filename", "{ORIGINAL FILENAME}"),
            ("YYYY-MM-DD_XXXX", "{YYYY}-{MM}-{DD}_{XXXX}"),
            ("YYMMDD_XXXX", "{YY}{MM}{DD}_{XXXX}"),
        ])
    }

    fn from_pairs(pairs: &[(&str, &str)]) -> Self {
        Self {
            templates: pairs
                .iter()
                .map(|(name, template)| (name.to_string(), template.to_string()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Result<&str, TemplateError> {
        self.templates
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.templates.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Adds or replaces a template. Returns the names of any unknown tokens
    /// so the editor can warn; they are stored anyway and stay literal.
    pub fn set(&mut self, name: &str, template: &str) -> Result<Vec<String>, TemplateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        self.templates.insert(name.to_string(), template.to_string());
        Ok(tokens::unknown_tokens(template))
    }

    pub fn rename(&mut self, from: &str, to: &str) -> Result<(), TemplateError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(TemplateError::EmptyName);
        }
        if from != to && self.templates.contains_key(to) {
            return Err(TemplateError::DuplicateName(to.to_string()));
        }
        let template = self
            .templates
            .remove(from)
            .ok_or_else(|| TemplateError::UnknownTemplate(from.to_string()))?;
        self.templates.insert(to.to_string(), template);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<String, TemplateError> {
        self.templates
            .remove(name)
            .ok_or_else(|| TemplateError::UnknownTemplate(name.to_string()))
    }
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_by_name() {
        let files = TemplateStore::default_filenames();
        assert_eq!(files.get("YYYY-MM-DD_XXXX").unwrap(), "{YYYY}-{MM}-{DD}_{XXXX}");
        assert_eq!(
            TemplateStore::default_paths().get("nope"),
            Err(TemplateError::UnknownTemplate("nope".into()))
        );
    }

    #[test]
    fn editor_operations() {
        let mut store = TemplateStore::new();
        assert_eq!(store.set("  ", "{YYYY}"), Err(TemplateError::EmptyName));
        assert_eq!(store.set("year", "{YYYY}{year}").unwrap(), vec!["year"]);
        store.set("day", "{DD}").unwrap();

        assert_eq!(
            store.rename("year", "day"),
            Err(TemplateError::DuplicateName("day".into()))
        );
        store.rename("year", "Year").unwrap();
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["Year", "day"]);

        assert_eq!(store.remove("day").unwrap(), "{DD}");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn serializes_as_plain_map() {
        let store = TemplateStore::default_paths();
        let json = serde_json::to_string(&store).unwrap();
        assert!(json.starts_with('{'));
        assert!(json.contains("\"YYYY/MM/DD\":\"{YYYY}/{MM}/{DD}\""));
        let back: TemplateStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, store);
    }
}
