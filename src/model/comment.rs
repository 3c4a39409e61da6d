use crate::model::{de, AuthorRef, Identified};
use crate::storage::{Row, ToRow};
use serde::Deserialize;

/// A comment on a post
///
/// `post_id` is taken from the payload when present and otherwise filled in
/// from the post whose comments were requested.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Comment {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub post_id: Option<String>,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default, deserialize_with = "de::count")]
    pub upvotes: i64,
    #[serde(default, deserialize_with = "de::count")]
    pub downvotes: i64,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl Comment {
    pub fn score(&self) -> i64 {
        self.upvotes.saturating_sub(self.downvotes)
    }
}

impl Identified for Comment {
    fn identity(&self) -> &str {
        &self.id
    }
}

impl ToRow for Comment {
    fn to_row(&self) -> Row {
        let author = self.author.clone().unwrap_or_default();
        Row::new()
            .with("id", self.id.as_str())
            .with("post_id", self.post_id.clone())
            .with("parent_id", self.parent_id.clone())
            .with("content", self.content.clone())
            .with("author_id", author.id)
            .with("author_name", author.name)
            .with("upvotes", self.upvotes)
            .with("downvotes", self.downvotes)
            .with("score", self.score())
            .with("created_at", self.created_at.clone())
    }
}
