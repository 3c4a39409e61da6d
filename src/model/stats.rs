use serde::Deserialize;

/// Platform-wide totals reported alongside the community list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct SiteStats {
    #[serde(default, rename = "count")]
    pub total_submolts: u64,
    #[serde(default)]
    pub total_posts: u64,
    #[serde(default)]
    pub total_comments: u64,
}
