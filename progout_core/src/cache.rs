use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::ExecutionResult;
use crate::command::CommandSpec;
use crate::error::Result;

/// Something that can run a spec to completion.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn get_output(&self, spec: &CommandSpec) -> Result<ExecutionResult>;
}

type Slot = Arc<OnceCell<Arc<ExecutionResult>>>;

/// Append-only memo table from [`CommandSpec`] to its [`ExecutionResult`].
///
/// Each spec is executed at most once, even when several tasks ask for it
/// at the same time: the first caller runs it and the others wait for that
/// result. Different specs run in parallel. Failures are not stored, so a
/// later call retries.
#[derive(Debug, Default)]
pub struct ResultCache {
    entries: Mutex<HashMap<CommandSpec, Slot>>,
}

impl ResultCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_execute<R>(
        &self,
        spec: &CommandSpec,
        runner: &R,
    ) -> Result<Arc<ExecutionResult>>
    where
        R: Runner + ?Sized,
    {
        let slot = self.slot(spec);
        if let Some(result) = slot.get() {
            debug!("Cache hit: {spec}");
            return Ok(Arc::clone(result));
        }

        let outcome = slot
            .get_or_try_init(|| async {
                debug!("Cache miss, executing: {spec}");
                runner.get_output(spec).await.map(Arc::new)
            })
            .await
            .map(Arc::clone);
        if outcome.is_err() {
            self.release_empty_slot(spec, slot);
        }
        outcome
    }

    /// Look up a finished result without running anything.
    #[must_use]
    pub fn get(&self, spec: &CommandSpec) -> Option<Arc<ExecutionResult>> {
        self.entries()
            .get(spec)
            .and_then(|slot| slot.get().cloned())
    }

    /// Number of specs with a stored result.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries()
            .values()
            .filter(|slot| slot.initialized())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, spec: &CommandSpec) -> Slot {
        Arc::clone(self.entries().entry(spec.clone()).or_default())
    }

    /// Drop `spec`'s slot after a failed run unless another caller is still
    /// waiting on it. Slots are only cloned under the map lock, so the count
    /// cannot grow while we hold it.
    fn release_empty_slot(&self, spec: &CommandSpec, slot: Slot) {
        let mut entries = self.entries();
        let unused = entries.get(spec).is_some_and(|stored| {
            Arc::ptr_eq(stored, &slot) && !slot.initialized() && Arc::strong_count(&slot) == 2
        });
        if unused {
            entries.remove(spec);
        }
    }

    // The map is only touched between awaits, so a poisoned lock still holds
    // consistent data.
    fn entries(&self) -> MutexGuard<'_, HashMap<CommandSpec, Slot>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
