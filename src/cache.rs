//! Sliding-expiry cache for discovered entity managers.
//!
//! Discovery walks backend catalogs and is far too slow to run per request,
//! so each mounted data source sits behind one of these. Every cache hit
//! extends the validity window; a miss triggers exactly one refresh, with
//! concurrent callers waiting on it instead of piling onto the backend.

use crate::manager::{DataSource, EntityManager, StoreError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

pub const DEFAULT_TTL: Duration = Duration::from_secs(600);

pub struct MetadataCache {
    source: Arc<dyn DataSource>,
    ttl: Duration,
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    managers: Option<Arc<Vec<Arc<dyn EntityManager>>>>,
    valid_until: Option<Instant>,
}

impl MetadataCache {
    #[must_use]
    pub fn new(source: Arc<dyn DataSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: Mutex::new(State::default()),
        }
    }

    /// Current entity managers, refreshed from the data source when the
    /// validity window has lapsed.
    ///
    /// # Errors
    ///
    /// Discovery failures propagate; the previous cached value, if any, is
    /// discarded so the next call retries.
    pub async fn managers(&self) -> Result<Arc<Vec<Arc<dyn EntityManager>>>, StoreError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let (Some(managers), Some(valid_until)) = (&state.managers, state.valid_until) {
            if now < valid_until {
                let managers = Arc::clone(managers);
                state.valid_until = Some(now + self.ttl);
                return Ok(managers);
            }
            debug!("metadata cache expired");
        }

        state.managers = None;
        let managers = Arc::new(self.source.fetch_entity_managers().await?);
        info!(entities = managers.len(), "metadata refreshed");
        state.managers = Some(Arc::clone(&managers));
        state.valid_until = Some(Instant::now() + self.ttl);
        Ok(managers)
    }

    /// Drop the cached value; the next call refreshes.
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.managers = None;
        state.valid_until = None;
    }
}
