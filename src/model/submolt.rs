use crate::model::{de, AuthorRef, Identified};
use crate::storage::{Row, ToRow};
use serde::Deserialize;

/// A community ("submolt"), identified by its unique name
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Submolt {
    pub name: String,
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "de::count")]
    pub subscriber_count: i64,
    #[serde(default)]
    pub post_count: Option<i64>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub last_activity_at: Option<String>,
    #[serde(default)]
    pub featured_at: Option<String>,
    #[serde(default)]
    pub created_by: Option<AuthorRef>,
}

impl Identified for Submolt {
    fn identity(&self) -> &str {
        &self.name
    }
}

impl ToRow for Submolt {
    fn to_row(&self) -> Row {
        let creator = self.created_by.clone().unwrap_or_default();
        Row::new()
            .with("name", self.name.as_str())
            .with("id", self.id.clone())
            .with("display_name", self.display_name.clone())
            .with("description", self.description.clone())
            .with("subscriber_count", self.subscriber_count)
            .with("post_count", self.post_count)
            .with("created_at", self.created_at.clone())
            .with("last_activity_at", self.last_activity_at.clone())
            .with("featured_at", self.featured_at.clone())
            .with("created_by_id", creator.id)
            .with("created_by_name", creator.name)
    }
}
