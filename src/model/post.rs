use crate::model::{de, AuthorRef, Identified};
use crate::storage::{Row, ToRow};
use serde::Deserialize;

/// Community reference embedded in a post
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SubmoltRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A post from the main feed or a community feed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Post {
    #[serde(deserialize_with = "de::id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default)]
    pub submolt: Option<SubmoltRef>,
    #[serde(default, deserialize_with = "de::count")]
    pub upvotes: i64,
    #[serde(default, deserialize_with = "de::count")]
    pub downvotes: i64,
    #[serde(default)]
    score: Option<i64>,
    #[serde(default, deserialize_with = "de::count")]
    pub comment_count: i64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "de::flag")]
    pub is_pinned: bool,
    /// Community whose feed produced this post; never part of the payload
    #[serde(skip)]
    pub source_submolt: Option<String>,
}

impl Post {
    /// Net score, falling back to `upvotes - downvotes` when the API omits it
    pub fn score(&self) -> i64 {
        self.score
            .unwrap_or_else(|| self.upvotes.saturating_sub(self.downvotes))
    }

    pub fn submolt_name(&self) -> Option<&str> {
        self.submolt.as_ref().and_then(|s| s.name.as_deref())
    }

    pub fn author_name(&self) -> Option<&str> {
        self.author.as_ref().and_then(|a| a.name.as_deref())
    }

    /// Returns the same post tagged with the community feed it came from
    pub fn with_source_submolt(mut self, submolt: impl Into<String>) -> Self {
        self.source_submolt = Some(submolt.into());
        self
    }
}

impl Identified for Post {
    fn identity(&self) -> &str {
        &self.id
    }
}

impl ToRow for Post {
    fn to_row(&self) -> Row {
        let author = self.author.clone().unwrap_or_default();
        let row = Row::new()
            .with("id", self.id.as_str())
            .with("title", self.title.clone())
            .with("content", self.content.clone())
            .with("url", self.url.clone())
            .with("author_id", author.id)
            .with("author_name", author.name)
            .with("submolt_name", self.submolt_name().map(str::to_string))
            .with("upvotes", self.upvotes)
            .with("downvotes", self.downvotes)
            .with("score", self.score())
            .with("comment_count", self.comment_count)
            .with("created_at", self.created_at.clone())
            .with("is_pinned", self.is_pinned);

        match &self.source_submolt {
            Some(source) => row.with("source_submolt", source.as_str()),
            None => row,
        }
    }
}
