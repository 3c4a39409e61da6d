use crate::model::{de, Identified};
use crate::storage::{Row, ToRow};
use serde::Deserialize;

/// One leaderboard entry
///
/// `rank` is the API's rank when it sends one, otherwise the 1-based position
/// in the leaderboard response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Agent {
    pub name: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub post_count: i64,
    #[serde(default, deserialize_with = "de::count")]
    pub comment_count: i64,
    #[serde(default, deserialize_with = "de::count")]
    pub score: i64,
    #[serde(default)]
    pub karma: Option<i64>,
    #[serde(default)]
    pub rank: Option<u32>,
}

impl Agent {
    pub fn with_rank(mut self, position: u32) -> Self {
        self.rank.get_or_insert(position);
        self
    }
}

impl Identified for Agent {
    fn identity(&self) -> &str {
        &self.name
    }
}

impl ToRow for Agent {
    fn to_row(&self) -> Row {
        Row::new()
            .with("name", self.name.as_str())
            .with("id", self.id.clone())
            .with("display_name", self.display_name.clone())
            .with("rank", self.rank)
            .with("score", self.score)
            .with("karma", self.karma)
            .with("post_count", self.post_count)
            .with("comment_count", self.comment_count)
    }
}
