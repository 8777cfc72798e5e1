use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cancellation flag shared between a cooperative task and whoever drives it.
/// Tasks check it at every batch boundary.
#[derive(Debug, Clone, Default)]
pub(crate) struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn abort(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub(crate) fn is_aborted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What the driver wants after a batch has been yielded to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Yield {
    Continue,
    Stop,
}

/// Run `work` over `items` in fixed-size batches. `on_batch` runs after each
/// batch with (batches done, items done) and is the only suspension point.
/// Returns the number of items processed and whether the run was cut short.
pub(crate) fn run_batched<T, W, Y>(
    items: &[T],
    batch_size: usize,
    abort: &AbortHandle,
    mut work: W,
    mut on_batch: Y,
) -> (usize, bool)
where
    W: FnMut(&[T]),
    Y: FnMut(usize, usize) -> Yield,
{
    let mut done = 0;
    for (i, batch) in items.chunks(batch_size.max(1)).enumerate() {
        if abort.is_aborted() {
            return (done, true);
        }
        work(batch);
        done += batch.len();
        if on_batch(i + 1, done) == Yield::Stop {
            return (done, done < items.len());
        }
    }
    (done, false)
}
