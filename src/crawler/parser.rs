//! Record mapper for raw API objects
//!
//! Mapping is pure: it never performs I/O and depends only on the raw object
//! plus the endpoint context it came from. Unknown fields are ignored, absent
//! optional fields become `None` or zero, and a field of the wrong JSON type
//! is a [`MapError`] rather than a coerced value.

use crate::model::{
    Agent, Comment, Identified, MapError, Post, Record, ResourceKind, SearchResult, Submolt,
};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Which request produced a raw object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapContext<'a> {
    /// Main feed, community list or leaderboard
    #[default]
    None,
    /// A community feed for the named submolt
    Submolt(&'a str),
    /// The comments of the post with this id
    Post(&'a str),
}

/// Maps one raw object to a record of the given kind
///
/// # Arguments
///
/// * `raw` - One element of a response envelope
/// * `kind` - The resource kind being harvested
/// * `context` - The request the object came from
///
/// # Returns
///
/// * `Ok(Record)` - The typed record
/// * `Err(MapError)` - The object is missing a required field or has a wrong-typed one
///
/// # Example
///
/// ```
/// use carcinologer::crawler::{map_record, MapContext};
/// use carcinologer::model::{Record, ResourceKind};
/// use serde_json::json;
///
/// let raw = json!({"id": "p1", "title": "Hello", "upvotes": 3});
/// let record = map_record(&raw, ResourceKind::SubmoltPosts, MapContext::Submolt("general")).unwrap();
/// match record {
///     Record::Post(post) => assert_eq!(post.source_submolt.as_deref(), Some("general")),
///     _ => unreachable!(),
/// }
/// ```
pub fn map_record(
    raw: &Value,
    kind: ResourceKind,
    context: MapContext<'_>,
) -> Result<Record, MapError> {
    match kind {
        ResourceKind::Communities => map_submolt(raw).map(Record::Submolt),
        ResourceKind::Leaderboard => map_agent(raw).map(Record::Agent),
        ResourceKind::Posts => map_post(raw, None).map(Record::Post),
        ResourceKind::SubmoltPosts => {
            let source = match context {
                MapContext::Submolt(name) => Some(name),
                _ => None,
            };
            map_post(raw, source).map(Record::Post)
        }
        ResourceKind::Comments => {
            let post_id = match context {
                MapContext::Post(id) => Some(id),
                _ => None,
            };
            map_comment(raw, post_id).map(Record::Comment)
        }
    }
}

pub fn map_submolt(raw: &Value) -> Result<Submolt, MapError> {
    decode(raw, ResourceKind::Communities)
}

pub fn map_agent(raw: &Value) -> Result<Agent, MapError> {
    decode(raw, ResourceKind::Leaderboard)
}

/// Maps a post; `source_submolt` is set only for community-feed posts
pub fn map_post(raw: &Value, source_submolt: Option<&str>) -> Result<Post, MapError> {
    let kind = if source_submolt.is_some() {
        ResourceKind::SubmoltPosts
    } else {
        ResourceKind::Posts
    };
    let post: Post = decode(raw, kind)?;
    Ok(match source_submolt {
        Some(name) => post.with_source_submolt(name),
        None => post,
    })
}

/// Maps a comment, filling `post_id` from the request when the payload omits it
pub fn map_comment(raw: &Value, post_id: Option<&str>) -> Result<Comment, MapError> {
    let mut comment: Comment = decode(raw, ResourceKind::Comments)?;
    if comment.post_id.is_none() {
        comment.post_id = post_id.map(str::to_string);
    }
    Ok(comment)
}

pub fn map_search_result(raw: &Value) -> Result<SearchResult, MapError> {
    // Search hits are mostly posts; errors are reported under that kind
    decode(raw, ResourceKind::Posts)
}

fn decode<T>(raw: &Value, kind: ResourceKind) -> Result<T, MapError>
where
    T: DeserializeOwned + Identified,
{
    if !raw.is_object() {
        return Err(MapError::NotAnObject {
            kind,
            found: json_type(raw).to_string(),
        });
    }

    let record = T::deserialize(raw).map_err(|source| MapError::Malformed { kind, source })?;
    if record.identity().trim().is_empty() {
        return Err(MapError::EmptyIdentity { kind });
    }
    Ok(record)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
