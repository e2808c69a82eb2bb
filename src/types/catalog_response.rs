use serde::{Deserialize, Serialize};

/// One model the server can serve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// The identifier to pass as `model` in a chat request.
    pub name: String,
}

/// Response from the catalog endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogResponse {
    /// Available models, in server order.
    pub models: Vec<CatalogEntry>,
}

impl CatalogResponse {
    /// The model identifiers in server order.
    pub fn names(&self) -> Vec<String> {
        self.models.iter().map(|m| m.name.clone()).collect()
    }
}
