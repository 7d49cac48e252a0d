//! TTL cache over the policy list so per-difference decisions do not hit
//! the store.

use std::time::{Duration, Instant};

use domain::error::Result;
use domain::repository::ResolutionRepository;
use domain::resolution::ResolutionPolicy;
use tokio::sync::Mutex;
use tracing::debug;

pub const DEFAULT_POLICY_TTL: Duration = Duration::from_secs(300);

pub struct PolicyCache {
    ttl: Duration,
    inner: Mutex<Option<CachedPolicies>>,
}

struct CachedPolicies {
    loaded_at: Instant,
    policies: Vec<ResolutionPolicy>,
}

impl PolicyCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(None),
        }
    }

    /// Policies ordered by id, refreshed from the store when stale.
    pub async fn get(&self, repo: &dyn ResolutionRepository) -> Result<Vec<ResolutionPolicy>> {
        let mut guard = self.inner.lock().await;
        if let Some(cached) = guard.as_ref() {
            if cached.loaded_at.elapsed() < self.ttl {
                return Ok(cached.policies.clone());
            }
        }

        debug!("refreshing resolution policy cache");
        let mut policies = repo.list_policies().await?;
        policies.sort_by_key(|p| p.id);
        *guard = Some(CachedPolicies {
            loaded_at: Instant::now(),
            policies: policies.clone(),
        });
        Ok(policies)
    }

    /// Drop the cached list; the next `get` reloads.
    pub async fn invalidate(&self) {
        *self.inner.lock().await = None;
    }
}

impl Default for PolicyCache {
    fn default() -> Self {
        Self::new(DEFAULT_POLICY_TTL)
    }
}
