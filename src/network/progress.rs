//! Progress notification and cancellation for long frame decodes.
//!
//! Decoding is all-or-nothing: an observer that breaks aborts the decode
//! with [`ParserError::Cancelled`](crate::error::ParserError::Cancelled)
//! and no frames are returned.

use std::ops::ControlFlow;

/// Snapshot of decode progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeProgress {
    /// Frames fully decoded so far.
    pub frames_done: usize,
    /// Frames declared by the header.
    pub frames_total: usize,
}

impl DecodeProgress {
    /// Completed fraction in `[0, 1]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.frames_total == 0 {
            1.0
        } else {
            self.frames_done as f64 / self.frames_total as f64
        }
    }
}

/// Receives periodic progress and may cancel the decode.
pub trait ProgressObserver {
    /// Called every `progress_interval` frames and once at the end.
    fn on_progress(&mut self, progress: DecodeProgress) -> ControlFlow<()>;
}

impl<F> ProgressObserver for F
where
    F: FnMut(DecodeProgress) -> ControlFlow<()>,
{
    fn on_progress(&mut self, progress: DecodeProgress) -> ControlFlow<()> {
        self(progress)
    }
}

/// An observer that ignores progress and never cancels.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_progress(&mut self, _progress: DecodeProgress) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }
}
