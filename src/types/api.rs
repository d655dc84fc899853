use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /pastes`. `content` is optional here only so a missing
/// field reaches validation instead of a deserialization error.
#[derive(Debug, Deserialize)]
pub struct CreatePaste {
    pub content: Option<String>,
    pub ttl_seconds: Option<i64>,
    pub max_views: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PasteCreated {
    pub id: String,
    pub url: String,
}

/// A successful read. Unbounded pastes carry explicit nulls for both limits.
#[derive(Debug, Serialize)]
pub struct PasteView {
    pub content: String,
    pub remaining_views: Option<u64>,
    pub expires_at: Option<DateTime<Utc>>,
}
