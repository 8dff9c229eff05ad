//! Cancellation and parallel source building
//!
//! Independent sources share no mutable state, so their builders may run on
//! separate threads. Results are slotted by source index, which keeps the
//! later fold independent of thread scheduling. Builders poll a shared
//! cancellation token between directory expansions.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation signal shared between a caller and its builders
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Run `job` once per index, in parallel when `parallel` is set.
///
/// The returned vector is ordered by index regardless of completion order.
pub fn run_indexed<T, F>(count: usize, parallel: bool, job: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if !parallel || count < 2 {
        return (0..count).map(&job).collect();
    }

    let slots: Mutex<Vec<Option<T>>> = Mutex::new((0..count).map(|_| None).collect());
    std::thread::scope(|scope| {
        for index in 0..count {
            let job = &job;
            let slots = &slots;
            scope.spawn(move || {
                let result = job(index);
                slots.lock()[index] = Some(result);
            });
        }
    });

    slots.into_inner().into_iter().flatten().collect()
}
