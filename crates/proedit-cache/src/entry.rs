//! Cache entries.

use crate::key::CacheKey;
use crate::resource::Resource;
use proedit_core::LogicalTime;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{trace, warn};

/// One cached build result.
///
/// `resource == None` records a failed build; it stays cached until the
/// sweeper drops it so a broken generator is not re-run every frame. Apart
/// from `last_used`, an entry never changes after insertion.
pub struct CacheEntry<R> {
    resource: Option<Arc<R>>,
    timeout: Duration,
    created_at: LogicalTime,
    last_used: LogicalTime,
}

impl<R> Clone for CacheEntry<R> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
            timeout: self.timeout,
            created_at: self.created_at,
            last_used: self.last_used,
        }
    }
}

impl<R> std::fmt::Debug for CacheEntry<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheEntry")
            .field("failed", &self.resource.is_none())
            .field("timeout", &self.timeout)
            .field("created_at", &self.created_at)
            .field("last_used", &self.last_used)
            .finish()
    }
}

impl<R: Resource> CacheEntry<R> {
    /// Entry created at `now`, which also counts as its first use.
    pub fn new(resource: Option<Arc<R>>, timeout: Duration, now: LogicalTime) -> Self {
        Self {
            resource,
            timeout,
            created_at: now,
            last_used: now,
        }
    }

    /// Cached failure.
    pub fn failed(timeout: Duration, now: LogicalTime) -> Self {
        Self::new(None, timeout, now)
    }

    pub fn resource(&self) -> Option<&Arc<R>> {
        self.resource.as_ref()
    }

    pub fn into_resource(self) -> Option<Arc<R>> {
        self.resource
    }

    pub fn is_failed(&self) -> bool {
        self.resource.is_none()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Logical time at which the entry was inserted.
    pub fn created_at(&self) -> LogicalTime {
        self.created_at
    }

    pub fn last_used(&self) -> LogicalTime {
        self.last_used
    }

    pub(crate) fn touch(&mut self, now: LogicalTime) {
        self.last_used = now;
    }

    /// Whether the entry has been idle longer than `max(timeout, min_timeout)`.
    pub fn is_expired(&self, now: LogicalTime, min_timeout: Duration) -> bool {
        now.abs_diff(self.last_used) > self.timeout.max(min_timeout)
    }

    /// Destroy the payload, containing both errors and panics.
    ///
    /// Returns `false` if the payload could not be released cleanly.
    pub(crate) fn destroy(self, cache: &str, key: &CacheKey) -> bool {
        let Some(resource) = self.resource else {
            return true;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| resource.destroy())) {
            Ok(Ok(())) => {
                trace!(cache, key = %key, "Resource destroyed");
                true
            }
            Ok(Err(e)) => {
                warn!(cache, key = %key, error = %e, "Failed to destroy resource");
                false
            }
            Err(payload) => {
                warn!(
                    cache,
                    key = %key,
                    panic = panic_message(payload.as_ref()),
                    "Resource destroy panicked"
                );
                false
            }
        }
    }
}

/// Best-effort text of a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
