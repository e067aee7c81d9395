//! Video frame containers: the unit of video caching.

use proedit_cache::{DestroyFlag, FrameSequence, Resource};
use proedit_core::{FrameBuffer, Result, SharedFrameBuffer};
use std::sync::Arc;
use tracing::trace;

/// A run of consecutive decoded frames starting at `start_frame`.
#[derive(Debug)]
pub struct FrameContainer {
    start_frame: usize,
    frames: Vec<SharedFrameBuffer>,
    destroyed: DestroyFlag,
}

impl FrameContainer {
    pub fn new(start_frame: usize, frames: Vec<FrameBuffer>) -> Self {
        Self {
            start_frame,
            frames: frames.into_iter().map(Arc::new).collect(),
            destroyed: DestroyFlag::new(),
        }
    }

    pub fn start_frame(&self) -> usize {
        self.start_frame
    }

    /// One past the last frame held, in stream frame numbers.
    pub fn end_frame(&self) -> usize {
        self.start_frame + self.frames.len()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_destroyed()
    }
}

impl Resource for FrameContainer {
    fn destroy(&self) -> Result<()> {
        if self.destroyed.mark() {
            trace!(
                start = self.start_frame,
                frames = self.frames.len(),
                "Frame container released"
            );
        }
        Ok(())
    }

    fn memory_size(&self) -> usize {
        self.frames.iter().map(|f| f.memory_size()).sum()
    }
}

impl FrameSequence for FrameContainer {
    type Frame = SharedFrameBuffer;

    fn frame(&self, offset: usize) -> Option<SharedFrameBuffer> {
        if self.is_destroyed() {
            return None;
        }
        self.frames.get(offset).cloned()
    }

    fn frame_len(&self) -> usize {
        self.frames.len()
    }
}
