//! Canary document forensics.
//!
//! A canary is a decoy document carrying a unique watermark token. The
//! registry indexes canaries by the sha-256 hash of their watermarked
//! content; the retrieval stage checks every candidate chunk against the
//! index and a hit fires the canary exactly once, no matter how many
//! concurrent retrievals observe it.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

use crate::{Error, Result};

/// Lifecycle state of a canary. `Triggered` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanaryStatus {
    /// Registered but not yet placed in the document store
    PendingUpload,
    /// Placed in the store and armed
    Active,
    /// Retrieved or manually fired; never leaves this state
    Triggered,
}

/// A registered canary document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Canary {
    /// Unique canary identifier
    pub id: String,
    /// Human-readable name of the decoy document
    pub name: String,
    /// Unique watermark token embedded in the document
    pub token: String,
    /// sha-256 hex digest of the watermarked content
    pub content_hash: String,
    /// Lifecycle state
    pub status: CanaryStatus,
    /// When the canary was registered
    pub created_at: DateTime<Utc>,
    /// When the canary fired, if it has
    pub triggered_at: Option<DateTime<Utc>>,
}

/// Record of a canary firing, returned to the caller for alert dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanaryTrigger {
    /// The canary, as of the moment it fired
    pub canary: Canary,
    /// When it fired
    pub triggered_at: DateTime<Utc>,
    /// Whether the trigger was manual rather than a retrieval hit
    pub manual: bool,
}

/// A registry match for retrieved content. The canary record is returned on
/// every hit; `trigger` is set only the one time the hit fires it.
#[derive(Debug, Clone)]
pub struct CanaryHit {
    /// The matched canary
    pub canary: Canary,
    /// The firing record, present only on the Active to Triggered transition
    pub trigger: Option<CanaryTrigger>,
}

/// sha-256 hex digest of a byte string.
pub fn hash_content(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// Watermark embedding and recovery.
///
/// The watermark is a header block prepended to the document: the unique
/// token, the canary ID, the registration timestamp, and the sha-256 of the
/// source content. The token line is what forensics scans for when leaked
/// text surfaces outside the system.
pub struct WatermarkService;

impl WatermarkService {
    const TOKEN_LINE: &'static str = "Internal Reference: ";

    /// Generate a fresh watermark token.
    pub fn generate_token() -> String {
        format!("CANARY-{}", Uuid::new_v4().simple())
    }

    /// Prepend the watermark header block to the source content.
    pub fn embed(
        token: &str,
        canary_id: &str,
        created_at: DateTime<Utc>,
        content: &str,
    ) -> String {
        let source_hash = hash_content(content);
        format!(
            "{}{}\nCanary-ID: {}\nTimestamp: {}\nSHA256: {}\n\n{}",
            Self::TOKEN_LINE,
            token,
            canary_id,
            created_at.to_rfc3339(),
            source_hash,
            content
        )
    }

    /// Recover the watermark token from leaked text, if one is present.
    pub fn recover_token(text: &str) -> Option<&str> {
        text.lines().find_map(|line| {
            line.strip_prefix(Self::TOKEN_LINE)
                .map(str::trim)
                .filter(|t| !t.is_empty())
        })
    }
}

/// In-memory canary registry indexed by content hash.
#[derive(Default)]
pub struct CanaryRegistry {
    by_hash: DashMap<String, Canary>,
    // canary id -> content hash
    id_index: DashMap<String, String>,
}

impl CanaryRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new canary for the given source content. Returns the
    /// canary record and the watermarked content to place in the store.
    /// A duplicate content hash would make forensic attribution ambiguous
    /// and is rejected.
    pub fn register(&self, name: impl Into<String>, content: &str) -> Result<(Canary, String)> {
        let id = Uuid::new_v4().to_string();
        let token = WatermarkService::generate_token();
        let created_at = Utc::now();
        let watermarked = WatermarkService::embed(&token, &id, created_at, content);
        let content_hash = hash_content(&watermarked);

        if self.by_hash.contains_key(&content_hash) {
            return Err(Error::canary(format!(
                "Duplicate canary content hash {}",
                content_hash
            )));
        }

        let canary = Canary {
            id: id.clone(),
            name: name.into(),
            token,
            content_hash: content_hash.clone(),
            status: CanaryStatus::PendingUpload,
            created_at,
            triggered_at: None,
        };
        self.by_hash.insert(content_hash.clone(), canary.clone());
        self.id_index.insert(id, content_hash);
        info!(canary_id = %canary.id, name = %canary.name, "canary registered");
        Ok((canary, watermarked))
    }

    /// Mark a canary as placed in the document store.
    pub fn mark_active(&self, canary_id: &str) -> Result<Canary> {
        let hash = self.hash_for(canary_id)?;
        let mut entry = self.by_hash.get_mut(&hash).ok_or_else(|| {
            Error::canary_with_id("Canary index is inconsistent", canary_id)
        })?;
        match entry.status {
            CanaryStatus::PendingUpload => {
                entry.status = CanaryStatus::Active;
                Ok(entry.clone())
            }
            CanaryStatus::Active => Ok(entry.clone()),
            CanaryStatus::Triggered => Err(Error::canary_with_id(
                "Canary has already triggered; it cannot be re-armed",
                canary_id,
            )),
        }
    }

    /// Check a retrieved chunk's content against the registry. Every lookup
    /// of registered canary content returns the hit, so callers always know
    /// to exclude the decoy; the firing record is carried only on the
    /// Active to Triggered transition, which happens under the per-key
    /// entry lock so concurrent hits fire at most once. A canary still
    /// pending upload is reported but never fired by retrieval.
    pub fn check_content(&self, content: &str) -> Option<CanaryHit> {
        let hash = hash_content(content);
        let mut entry = self.by_hash.get_mut(&hash)?;
        let trigger = match entry.status {
            CanaryStatus::Active => self.fire(&mut entry, false),
            CanaryStatus::PendingUpload | CanaryStatus::Triggered => None,
        };
        Some(CanaryHit {
            canary: entry.clone(),
            trigger,
        })
    }

    /// Fire a canary by ID, regardless of retrieval. Used when leaked
    /// content is identified out of band.
    pub fn trigger_manual(&self, canary_id: &str) -> Result<Option<CanaryTrigger>> {
        let hash = self.hash_for(canary_id)?;
        let mut entry = self.by_hash.get_mut(&hash).ok_or_else(|| {
            Error::canary_with_id("Canary index is inconsistent", canary_id)
        })?;
        Ok(self.fire(&mut entry, true))
    }

    fn fire(&self, canary: &mut Canary, manual: bool) -> Option<CanaryTrigger> {
        if canary.status == CanaryStatus::Triggered {
            return None;
        }
        let triggered_at = Utc::now();
        canary.status = CanaryStatus::Triggered;
        canary.triggered_at = Some(triggered_at);
        info!(canary_id = %canary.id, manual, "canary triggered");
        Some(CanaryTrigger {
            canary: canary.clone(),
            triggered_at,
            manual,
        })
    }

    /// Look up a canary by ID.
    pub fn get(&self, canary_id: &str) -> Option<Canary> {
        let hash = self.id_index.get(canary_id)?;
        self.by_hash.get(hash.value()).map(|c| c.clone())
    }

    /// List canaries, optionally filtered by status.
    pub fn list(&self, status: Option<CanaryStatus>) -> Vec<Canary> {
        let mut canaries: Vec<Canary> = self
            .by_hash
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|c| status.map_or(true, |s| c.status == s))
            .collect();
        canaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        canaries
    }

    /// Number of registered canaries.
    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }

    fn hash_for(&self, canary_id: &str) -> Result<String> {
        self.id_index
            .get(canary_id)
            .map(|h| h.value().clone())
            .ok_or_else(|| Error::canary_with_id("Canary not found", canary_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_watermark_roundtrip() {
        let (canary, watermarked) = CanaryRegistry::new()
            .register("q3-financials", "decoy revenue figures")
            .unwrap();
        assert!(watermarked.ends_with("decoy revenue figures"));
        assert_eq!(
            WatermarkService::recover_token(&watermarked),
            Some(canary.token.as_str())
        );
        assert_eq!(WatermarkService::recover_token("plain text"), None);
    }

    #[test]
    fn test_lifecycle() {
        let registry = CanaryRegistry::new();
        let (canary, watermarked) = registry.register("decoy", "contents").unwrap();
        assert_eq!(canary.status, CanaryStatus::PendingUpload);

        let armed = registry.mark_active(&canary.id).unwrap();
        assert_eq!(armed.status, CanaryStatus::Active);

        let hit = registry.check_content(&watermarked).unwrap();
        let trigger = hit.trigger.unwrap();
        assert_eq!(trigger.canary.status, CanaryStatus::Triggered);
        assert!(!trigger.manual);

        // terminal: cannot re-arm, cannot fire again, but lookups still hit
        assert!(registry.mark_active(&canary.id).is_err());
        let repeat = registry.check_content(&watermarked).unwrap();
        assert_eq!(repeat.canary.id, canary.id);
        assert!(repeat.trigger.is_none());
        assert!(registry.trigger_manual(&canary.id).unwrap().is_none());
    }

    #[test]
    fn test_pending_upload_hit_reported_but_not_fired() {
        let registry = CanaryRegistry::new();
        let (canary, watermarked) = registry.register("decoy", "contents").unwrap();

        let hit = registry.check_content(&watermarked).unwrap();
        assert_eq!(hit.canary.id, canary.id);
        assert!(hit.trigger.is_none());
        assert_eq!(
            registry.get(&canary.id).unwrap().status,
            CanaryStatus::PendingUpload
        );

        // firing still works once the canary is armed
        registry.mark_active(&canary.id).unwrap();
        assert!(registry.check_content(&watermarked).unwrap().trigger.is_some());
    }

    #[test]
    fn test_manual_trigger() {
        let registry = CanaryRegistry::new();
        let (canary, _) = registry.register("decoy", "contents").unwrap();
        let trigger = registry.trigger_manual(&canary.id).unwrap().unwrap();
        assert!(trigger.manual);
        assert_eq!(
            registry.get(&canary.id).unwrap().status,
            CanaryStatus::Triggered
        );
    }

    #[test]
    fn test_unknown_canary_id() {
        let registry = CanaryRegistry::new();
        assert!(registry.trigger_manual("nope").is_err());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_list_filter() {
        let registry = CanaryRegistry::new();
        let (a, _) = registry.register("a", "content a").unwrap();
        let (_b, _) = registry.register("b", "content b").unwrap();
        registry.mark_active(&a.id).unwrap();

        assert_eq!(registry.list(None).len(), 2);
        assert_eq!(registry.list(Some(CanaryStatus::Active)).len(), 1);
        assert_eq!(registry.list(Some(CanaryStatus::PendingUpload)).len(), 1);
        assert!(registry.list(Some(CanaryStatus::Triggered)).is_empty());
    }

    #[test]
    fn test_single_fire_under_concurrency() {
        let registry = Arc::new(CanaryRegistry::new());
        let (canary, watermarked) = registry.register("decoy", "contents").unwrap();
        registry.mark_active(&canary.id).unwrap();

        let watermarked = Arc::new(watermarked);
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let content = Arc::clone(&watermarked);
                std::thread::spawn(move || {
                    let hit = registry.check_content(&content).unwrap();
                    hit.trigger.is_some()
                })
            })
            .collect();

        // every thread sees the hit; exactly one carries the firing record
        let fires = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|fired| *fired)
            .count();
        assert_eq!(fires, 1);
    }
}
