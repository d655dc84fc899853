use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::info;

use crate::config::Config;
use crate::error::ApiError;
use crate::models::Paste;
use crate::store::{AnyKv, KvStore};
use crate::types::api::{PasteCreated, PasteView};

/// Attempts at the read-side compare-and-swap before giving up. A retry only
/// happens when a concurrent read rewrote the same record first.
const CAS_RETRIES: u32 = 4;

/// Store expiry applied by the final allowed view: long enough to finish
/// serving the current response, short enough that the record disappears on
/// its own (the exhaustion check covers the window in between).
const EXHAUSTED_EXPIRY: Duration = Duration::from_secs(1);

/// Owns the paste lifecycle: id generation, record encoding, and the
/// expiry/view state machine. Constructed once at startup with its
/// configuration; nothing in here reads the environment.
#[derive(Clone)]
pub struct PasteStore {
    kv: AnyKv,
    base_url: String,
    default_retention: Duration,
}

impl PasteStore {
    pub fn new(kv: AnyKv, config: &Config) -> Self {
        PasteStore {
            kv,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_retention: Duration::from_secs(config.retention.default_secs),
        }
    }

    /// Validate and persist a new paste. Validation failures happen before
    /// any store write.
    pub async fn create(
        &mut self,
        content: &str,
        ttl_seconds: Option<i64>,
        max_views: Option<i64>,
    ) -> crate::ApiResult<PasteCreated> {
        self.create_at(content, ttl_seconds, max_views, Utc::now())
            .await
    }

    pub async fn create_at(
        &mut self,
        content: &str,
        ttl_seconds: Option<i64>,
        max_views: Option<i64>,
        now: DateTime<Utc>,
    ) -> crate::ApiResult<PasteCreated> {
        if content.trim().is_empty() {
            return Err(ApiError::InvalidArgument("content required".to_string()));
        }
        if matches!(ttl_seconds, Some(ttl) if ttl < 1) {
            return Err(ApiError::InvalidArgument(
                "ttl_seconds must be >= 1".to_string(),
            ));
        }
        if matches!(max_views, Some(max) if max < 1) {
            return Err(ApiError::InvalidArgument(
                "max_views must be >= 1".to_string(),
            ));
        }

        let id = generate_id();
        let paste = Paste {
            id: id.clone(),
            content: content.to_string(),
            created_at: now,
            ttl_seconds: ttl_seconds.map(|ttl| ttl as u64),
            max_views: max_views.map(|max| max as u64),
            views: 0,
        };

        let encoded = serde_json::to_string(&paste)?;
        self.kv
            .set_ex(&Paste::storage_key(&id), &encoded, self.store_expiry(&paste))
            .await?;

        info!(
            "new paste: id='{id}', size={size}, ttl={ttl:?}, max_views={max_views:?}",
            size = paste.content.len(),
            ttl = paste.ttl_seconds,
            max_views = paste.max_views,
        );

        Ok(PasteCreated {
            url: format!("{base_url}/p/{id}", base_url = self.base_url),
            id,
        })
    }

    /// Read a paste, counting the view against its limit.
    pub async fn read(&mut self, id: &str) -> crate::ApiResult<PasteView> {
        self.read_at(id, Utc::now()).await
    }

    /// Read at an explicit `now`, which drives the logical expiry check.
    ///
    /// The rewrite of the view counter goes through compare-and-swap: a read
    /// losing the race against a concurrent read re-fetches the record and
    /// re-runs the expiry checks, so `views` can never pass `max_views`.
    pub async fn read_at(&mut self, id: &str, now: DateTime<Utc>) -> crate::ApiResult<PasteView> {
        let key = Paste::storage_key(id);

        for _ in 0..CAS_RETRIES {
            let Some(encoded) = self.kv.get(&key).await? else {
                return Err(ApiError::NotFound);
            };
            let mut paste: Paste = serde_json::from_str(&encoded)?;

            // Lazy expiry: the record may outlive its logical TTL in the
            // store until someone reads it.
            if paste.is_expired(now) {
                info!("deleting expired paste: {id}");
                self.kv.delete(&key).await?;
                return Err(ApiError::NotFound);
            }

            // A previous read consumed the last allowed view.
            if paste.is_exhausted() {
                info!("deleting exhausted paste: {id}");
                self.kv.delete(&key).await?;
                return Err(ApiError::NotFound);
            }

            paste.views += 1;

            // The final allowed view still returns content, but the record
            // gets a near-immediate expiry so no later read can succeed.
            let expiry = if paste.is_exhausted() {
                EXHAUSTED_EXPIRY
            } else {
                self.store_expiry(&paste)
            };

            let next = serde_json::to_string(&paste)?;
            if self.kv.compare_and_swap(&key, &encoded, &next, expiry).await? {
                return Ok(PasteView {
                    remaining_views: paste.remaining_views(),
                    expires_at: paste.expires_at(),
                    content: paste.content,
                });
            }
        }

        Err(ApiError::Conflict)
    }

    /// Store-level expiry for a record: the logical TTL when set, otherwise
    /// the default retention window, so unbounded pastes do not accumulate
    /// forever.
    fn store_expiry(&self, paste: &Paste) -> Duration {
        paste
            .ttl_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_retention)
    }
}

/// 8 bytes from the OS entropy pool, hex-encoded. No uniqueness check against
/// the store; a collision at this entropy would overwrite an existing paste.
fn generate_id() -> String {
    let mut bytes = [0u8; 8];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::store::MemoryKv;

    fn store() -> PasteStore {
        PasteStore::new(AnyKv::from(MemoryKv::new()), &Config::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn ids_are_sixteen_hex_chars_and_distinct() {
        let a = generate_id();
        let b = generate_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn create_then_read_returns_content() {
        let mut store = store();
        let created = store.create("some text", None, None).await.unwrap();
        assert_eq!(created.url, format!("http://localhost:3000/p/{}", created.id));

        let view = store.read(&created.id).await.unwrap();
        assert_eq!(view.content, "some text");
        assert_eq!(view.remaining_views, None);
        assert_eq!(view.expires_at, None);
    }

    #[tokio::test]
    async fn empty_and_whitespace_content_rejected() {
        let mut store = store();
        for content in ["", "   ", "\n\t "] {
            let err = store.create(content, None, None).await.unwrap_err();
            match err {
                ApiError::InvalidArgument(msg) => assert_eq!(msg, "content required"),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[tokio::test]
    async fn non_positive_ttl_rejected() {
        let mut store = store();
        for ttl in [0, -1, -3600] {
            let err = store.create("x", Some(ttl), None).await.unwrap_err();
            match err {
                ApiError::InvalidArgument(msg) => assert_eq!(msg, "ttl_seconds must be >= 1"),
                other => panic!("unexpected error: {other}"),
            }
        }
        store.create("x", Some(1), None).await.unwrap();
    }

    #[tokio::test]
    async fn non_positive_max_views_rejected() {
        let mut store = store();
        for max in [0, -5] {
            let err = store.create("x", None, Some(max)).await.unwrap_err();
            match err {
                ApiError::InvalidArgument(msg) => assert_eq!(msg, "max_views must be >= 1"),
                other => panic!("unexpected error: {other}"),
            }
        }
        store.create("x", None, Some(1)).await.unwrap();
    }

    #[tokio::test]
    async fn unbounded_paste_survives_repeated_reads() {
        let mut store = store();
        let created = store.create("keep me", None, None).await.unwrap();

        for _ in 0..5 {
            let view = store.read(&created.id).await.unwrap();
            assert_eq!(view.content, "keep me");
            assert_eq!(view.remaining_views, None);
        }
    }

    #[tokio::test]
    async fn ttl_expiry_is_lazy_and_boundary_inclusive() {
        let mut store = store();
        let created = store
            .create_at("short lived", Some(60), None, t0())
            .await
            .unwrap();

        let view = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(59))
            .await
            .unwrap();
        assert_eq!(view.content, "short lived");
        assert_eq!(view.expires_at, Some(t0() + chrono::Duration::seconds(60)));

        let err = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));

        // the expired record was deleted, so later reads stay NotFound
        let err = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(61))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn view_limit_grants_exactly_max_views_reads() {
        let mut store = store();
        let created = store.create("twice only", None, Some(2)).await.unwrap();

        let first = store.read(&created.id).await.unwrap();
        assert_eq!(first.content, "twice only");
        assert_eq!(first.remaining_views, Some(1));

        let second = store.read(&created.id).await.unwrap();
        assert_eq!(second.content, "twice only");
        assert_eq!(second.remaining_views, Some(0));

        let err = store.read(&created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn single_view_paste_burns_after_one_read() {
        let mut store = store();
        let created = store.create("once", None, Some(1)).await.unwrap();

        let view = store.read(&created.id).await.unwrap();
        assert_eq!(view.remaining_views, Some(0));

        let err = store.read(&created.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let mut store = store();
        let err = store.read("feedfacedeadbeef").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn halfway_read_reports_absolute_expiry() {
        let mut store = store();
        let created = store
            .create_at("hello", Some(3600), None, t0())
            .await
            .unwrap();

        let view = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(1800))
            .await
            .unwrap();
        assert_eq!(view.content, "hello");
        assert_eq!(view.remaining_views, None);
        assert_eq!(view.expires_at, Some(t0() + chrono::Duration::seconds(3600)));
    }

    #[tokio::test]
    async fn ttl_and_view_limit_combine() {
        let mut store = store();
        let created = store
            .create_at("both", Some(60), Some(2), t0())
            .await
            .unwrap();

        let view = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(10))
            .await
            .unwrap();
        assert_eq!(view.remaining_views, Some(1));
        assert_eq!(view.expires_at, Some(t0() + chrono::Duration::seconds(60)));

        // time runs out before the second view is used
        let err = store
            .read_at(&created.id, t0() + chrono::Duration::seconds(60))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
