//! Deferred destruction for thread-affine resources.
//!
//! GPU textures and similar handles may only be released on the thread that
//! owns the graphics context, but sweeps can run anywhere. Wrap such a
//! resource in [`Deferred`]: evicting it only queues the release, and the
//! owning thread calls [`DestroyQueue::drain`] once per frame.

use crate::entry::panic_message;
use crate::resource::Resource;
use crossbeam_channel::{Receiver, Sender};
use proedit_core::Result;
use std::ops::Deref;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() -> Result<()> + Send>;

/// Receiving end, owned by the thread that must run the destroys.
pub struct DestroyQueue {
    tx: Sender<(String, Job)>,
    rx: Receiver<(String, Job)>,
}

impl Default for DestroyQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl DestroyQueue {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn handle(&self) -> DestroyHandle {
        DestroyHandle {
            tx: self.tx.clone(),
        }
    }

    /// Run every queued destroy on the calling thread. Returns how many ran.
    pub fn drain(&self) -> usize {
        let mut ran = 0;
        for (label, job) in self.rx.try_iter() {
            ran += 1;
            match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(resource = %label, error = %e, "Deferred destroy failed");
                }
                Err(payload) => {
                    warn!(
                        resource = %label,
                        panic = panic_message(payload.as_ref()),
                        "Deferred destroy panicked"
                    );
                }
            }
        }
        if ran > 0 {
            debug!(count = ran, "Drained deferred destroys");
        }
        ran
    }

    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

/// Cloneable sending end handed to [`Deferred`] wrappers.
#[derive(Clone)]
pub struct DestroyHandle {
    tx: Sender<(String, Job)>,
}

impl DestroyHandle {
    fn submit(&self, label: String, job: Job) -> Result<()> {
        self.tx
            .send((label, job))
            .map_err(|_| proedit_core::ProEditError::Destroyed("destroy queue closed".into()))
    }
}

/// A resource whose `destroy()` is forwarded to a [`DestroyQueue`].
pub struct Deferred<R> {
    inner: Arc<R>,
    label: String,
    queue: DestroyHandle,
}

impl<R: Resource> Deferred<R> {
    pub fn new(inner: R, label: impl Into<String>, queue: DestroyHandle) -> Self {
        Self {
            inner: Arc::new(inner),
            label: label.into(),
            queue,
        }
    }
}

impl<R> Deref for Deferred<R> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.inner
    }
}

impl<R: Resource> Resource for Deferred<R> {
    fn destroy(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        self.queue
            .submit(self.label.clone(), Box::new(move || inner.destroy()))
    }

    fn memory_size(&self) -> usize {
        self.inner.memory_size()
    }
}
