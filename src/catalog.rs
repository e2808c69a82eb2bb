//! The models a server offers and the one the user has chosen.

use crate::error::{Error, Result};
use crate::types::CatalogResponse;

/// The last fetched catalog plus the current model selection.
///
/// A refresh replaces the catalog wholesale.  It only picks a model when none is selected, so
/// a user's choice survives every refresh.
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    models: Vec<String>,
    selection: Option<String>,
}

impl ModelCatalog {
    /// Creates an empty catalog with no selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a freshly fetched catalog and return its model identifiers in server order.
    pub fn apply(&mut self, response: &CatalogResponse) -> Vec<String> {
        self.models = response.names();
        if self.selection.is_none() {
            self.selection = self.models.first().cloned();
        }
        self.models.clone()
    }

    /// Choose the model for subsequent requests.
    ///
    /// The name does not have to appear in the catalog; the server is the authority on what
    /// it can serve.
    pub fn select(&mut self, name: &str) -> Result<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::validation(
                "model name must not be empty",
                Some("model".to_string()),
            ));
        }
        self.selection = Some(name.to_string());
        Ok(())
    }

    /// The selected model, if any.
    pub fn selection(&self) -> Option<&str> {
        self.selection.as_deref()
    }

    /// The models from the last successful refresh.
    pub fn models(&self) -> &[String] {
        &self.models
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CatalogEntry;

    fn catalog(names: &[&str]) -> CatalogResponse {
        CatalogResponse {
            models: names
                .iter()
                .map(|n| CatalogEntry {
                    name: n.to_string(),
                })
                .collect(),
        }
    }

    #[test]
    fn first_refresh_selects_first_model() {
        let mut cat = ModelCatalog::new();
        let names = cat.apply(&catalog(&["llama3.1:8b", "qwen2.5:7b"]));
        assert_eq!(names, vec!["llama3.1:8b", "qwen2.5:7b"]);
        assert_eq!(cat.selection(), Some("llama3.1:8b"));
    }

    #[test]
    fn refresh_preserves_selection() {
        let mut cat = ModelCatalog::new();
        cat.select("mistral:7b").unwrap();
        cat.apply(&catalog(&["llama3.1:8b"]));
        assert_eq!(cat.selection(), Some("mistral:7b"));
        assert_eq!(cat.models(), &["llama3.1:8b".to_string()]);
    }

    #[test]
    fn empty_catalog_selects_nothing() {
        let mut cat = ModelCatalog::new();
        cat.apply(&catalog(&[]));
        assert_eq!(cat.selection(), None);
        cat.apply(&catalog(&["phi3"]));
        assert_eq!(cat.selection(), Some("phi3"));
    }

    #[test]
    fn blank_selection_rejected() {
        let mut cat = ModelCatalog::new();
        cat.select("phi3").unwrap();
        assert!(cat.select("   ").unwrap_err().is_validation());
        assert_eq!(cat.selection(), Some("phi3"));
    }
}
