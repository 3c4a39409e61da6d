use crate::model::{de, AuthorRef, Identified};
use serde::Deserialize;

/// One hit from the search endpoint. Never persisted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SearchResult {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    /// `post`, `comment`, ... as reported by the API
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub post_id: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Identified for SearchResult {
    fn identity(&self) -> &str {
        &self.id
    }
}
