//! Domain records for the Moltbook API
//!
//! Each entity is a plain value type with a fixed field set. Entities are
//! deserialized from the raw JSON objects the API returns (unknown fields are
//! ignored) and serialized to dataset rows through [`ToRow`].

mod agent;
mod comment;
mod post;
mod search;
mod stats;
mod submolt;

pub use agent::Agent;
pub use comment::Comment;
pub use post::Post;
pub use search::SearchResult;
pub use stats::SiteStats;
pub use submolt::Submolt;

pub use crate::storage::{Row, ToRow};

use std::fmt;
use thiserror::Error;

/// The persisted resource kinds, one dataset file each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Communities,
    Leaderboard,
    Posts,
    SubmoltPosts,
    Comments,
}

/// How a freshly fetched dataset is combined with the stored one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistMode {
    /// The new snapshot supersedes the stored file
    Replace,
    /// The new rows are merged into the stored file by identity
    Merge,
}

impl ResourceKind {
    /// All kinds, in the order a run visits them
    pub const ALL: [ResourceKind; 5] = [
        Self::Communities,
        Self::Leaderboard,
        Self::Posts,
        Self::SubmoltPosts,
        Self::Comments,
    ];

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Communities => "communities",
            Self::Leaderboard => "leaderboard",
            Self::Posts => "posts",
            Self::SubmoltPosts => "submolt_posts",
            Self::Comments => "comments",
        }
    }

    /// File name of the dataset inside the data directory
    pub fn file_name(&self) -> String {
        format!("{}.sqlite", self.to_db_string())
    }

    /// Column holding the record identity
    pub fn identity_key(&self) -> &'static str {
        match self {
            Self::Communities | Self::Leaderboard => "name",
            Self::Posts | Self::SubmoltPosts | Self::Comments => "id",
        }
    }

    pub fn persist_mode(&self) -> PersistMode {
        match self {
            Self::Communities | Self::Leaderboard => PersistMode::Replace,
            Self::Posts | Self::SubmoltPosts | Self::Comments => PersistMode::Merge,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Records that carry a stable identity
///
/// The identity doubles as the pagination cursor for the feed endpoints.
pub trait Identified {
    fn identity(&self) -> &str;
}

/// A mapped record of any persisted kind
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Submolt(Submolt),
    Agent(Agent),
    Post(Post),
    Comment(Comment),
}

impl Identified for Record {
    fn identity(&self) -> &str {
        match self {
            Self::Submolt(s) => s.identity(),
            Self::Agent(a) => a.identity(),
            Self::Post(p) => p.identity(),
            Self::Comment(c) => c.identity(),
        }
    }
}

impl ToRow for Record {
    fn to_row(&self) -> Row {
        match self {
            Self::Submolt(s) => s.to_row(),
            Self::Agent(a) => a.to_row(),
            Self::Post(p) => p.to_row(),
            Self::Comment(c) => c.to_row(),
        }
    }
}

/// A raw object that cannot become a record
#[derive(Debug, Error)]
pub enum MapError {
    #[error("Expected a JSON object for {kind}, got {found}")]
    NotAnObject { kind: ResourceKind, found: String },

    #[error("Malformed {kind} record: {source}")]
    Malformed {
        kind: ResourceKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} record has an empty identity")]
    EmptyIdentity { kind: ResourceKind },
}

/// Reference to an author embedded in posts and comments
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct AuthorRef {
    #[serde(default, deserialize_with = "de::opt_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub(crate) mod de {
    //! Identity fields arrive as JSON strings or numbers

    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Uint(u64),
    }

    impl RawId {
        fn into_string(self) -> String {
            match self {
                Self::Text(s) => s,
                Self::Int(i) => i.to_string(),
                Self::Uint(u) => u.to_string(),
            }
        }
    }

    pub fn id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        RawId::deserialize(deserializer).map(RawId::into_string)
    }

    pub fn opt_id<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(RawId::into_string))
    }

    /// Treats an explicit JSON null the same as a missing counter
    pub fn count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
        Option::<i64>::deserialize(deserializer).map(Option::unwrap_or_default)
    }

    pub fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        Option::<bool>::deserialize(deserializer).map(Option::unwrap_or_default)
    }
}
