use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A stored paste record, one JSON object per `paste:<id>` key.
///
/// `content` and `created_at` never change after creation; `views` is the
/// only field a read may rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paste {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_views: Option<u64>,
    pub views: u64,
}

impl Paste {
    /// Key under which a record lives in the backing store.
    pub fn storage_key(id: &str) -> String {
        format!("paste:{id}")
    }

    /// Absolute logical expiry, or `None` for pastes without a TTL.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.ttl_seconds
            .map(|ttl| self.created_at + Duration::seconds(ttl as i64))
    }

    /// Whether the logical TTL has elapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at(), Some(expiry) if now >= expiry)
    }

    /// Whether the view limit has already been reached.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.max_views, Some(max) if self.views >= max)
    }

    /// Views left before exhaustion, or `None` for unbounded pastes.
    pub fn remaining_views(&self) -> Option<u64> {
        self.max_views.map(|max| max.saturating_sub(self.views))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn make_paste(ttl_seconds: Option<u64>, max_views: Option<u64>, views: u64) -> Paste {
        Paste {
            id: "0123456789abcdef".to_string(),
            content: "hello".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            ttl_seconds,
            max_views,
            views,
        }
    }

    #[test]
    fn expiry_boundary_is_inclusive() {
        let paste = make_paste(Some(60), None, 0);
        let created = paste.created_at;

        assert!(!paste.is_expired(created + Duration::seconds(59)));
        assert!(paste.is_expired(created + Duration::seconds(60)));
        assert!(paste.is_expired(created + Duration::seconds(3600)));
    }

    #[test]
    fn no_ttl_never_expires_logically() {
        let paste = make_paste(None, None, 0);
        assert_eq!(paste.expires_at(), None);
        assert!(!paste.is_expired(paste.created_at + Duration::days(365)));
    }

    #[test]
    fn exhaustion_requires_a_view_limit() {
        assert!(!make_paste(None, None, 100).is_exhausted());
        assert!(!make_paste(None, Some(3), 2).is_exhausted());
        assert!(make_paste(None, Some(3), 3).is_exhausted());
    }

    #[test]
    fn remaining_views_counts_down_to_zero() {
        assert_eq!(make_paste(None, None, 5).remaining_views(), None);
        assert_eq!(make_paste(None, Some(2), 1).remaining_views(), Some(1));
        assert_eq!(make_paste(None, Some(2), 2).remaining_views(), Some(0));
    }

    #[test]
    fn wire_format_uses_camel_case_and_omits_absent_limits() {
        let value = serde_json::to_value(make_paste(Some(60), None, 0)).unwrap();
        assert_eq!(value["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(value["ttlSeconds"], 60);
        assert!(value.get("maxViews").is_none());
        assert_eq!(value["views"], 0);
    }

    #[test]
    fn wire_format_round_trips() {
        let paste = make_paste(Some(60), Some(2), 1);
        let encoded = serde_json::to_string(&paste).unwrap();
        let decoded: Paste = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, paste);
    }
}
