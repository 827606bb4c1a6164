use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::errors::ServiceError;

/// Header carrying the caller's idempotency key
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

/// Compute hash of request body
pub fn request_fingerprint(body: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body);
    hex::encode(hasher.finalize())
}

#[derive(Clone)]
struct StoredResponse<T> {
    request_hash: String,
    value: T,
    stored_at: Instant,
}

/// Replays the result of a mutating request that carried an
/// `Idempotency-Key`. Entries expire after `ttl`.
///
/// Two concurrent first requests with the same key are not coalesced; only
/// requests that arrive after the first one completed are replayed.
#[derive(Clone)]
pub struct IdempotencyStore<T> {
    entries: Arc<DashMap<String, StoredResponse<T>>>,
    ttl: Duration,
}

impl<T: Clone> IdempotencyStore<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    /// Returns the stored value for `key` when the same request was seen
    /// before. Reusing a key with a different body is a conflict.
    pub fn lookup(&self, key: &str, request_hash: &str) -> Result<Option<T>, ServiceError> {
        self.cleanup();

        let Some(stored) = self.entries.get(key) else {
            return Ok(None);
        };

        if stored.request_hash != request_hash {
            return Err(ServiceError::IdempotencyConflict(
                "Idempotency key reused with different request".to_string(),
            ));
        }

        debug!(idempotency_key = key, "replaying stored response");
        Ok(Some(stored.value.clone()))
    }

    pub fn store(&self, key: &str, request_hash: String, value: T) {
        self.entries.insert(
            key.to_string(),
            StoredResponse {
                request_hash,
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn cleanup(&self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, stored| stored.stored_at.elapsed() < ttl);
    }
}
