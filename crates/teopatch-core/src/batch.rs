//! Run independent per-file jobs on a small pool of scoped worker threads.

use std::{collections::VecDeque, num::NonZeroUsize, thread};

use parking_lot::Mutex;
use tracing::{debug, debug_span, info, instrument, warn};

#[derive(Debug)]
pub struct BatchOutcome<T, E> {
    pub index: usize,
    pub result: Result<T, E>,
}

#[derive(Debug)]
pub struct BatchReport<T, E> {
    /// One outcome per input, in input order.
    pub outcomes: Vec<BatchOutcome<T, E>>,
}

impl<T, E> BatchReport<T, E> {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.is_ok())
            .count()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = (usize, &E)> {
        self.outcomes
            .iter()
            .filter_map(|outcome| outcome.result.as_ref().err().map(|error| (outcome.index, error)))
    }
}

/// `0` means one worker per available CPU.
#[must_use]
pub fn resolve_workers(requested: usize) -> usize {
    if requested > 0 {
        return requested;
    }
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// Apply `job` to every item. A failing item is reported in its outcome and never stops
/// the remaining items.
#[instrument(skip(items, job), fields(items = items.len()))]
pub fn run_batch<I, T, E, F>(items: Vec<I>, workers: usize, job: F) -> BatchReport<T, E>
where
    I: Send,
    T: Send,
    E: Send + std::fmt::Display,
    F: Fn(usize, I) -> Result<T, E> + Sync,
{
    let total = items.len();
    let workers = resolve_workers(workers).min(total.max(1));
    let queue = Mutex::new(items.into_iter().enumerate().collect::<VecDeque<_>>());
    let finished = Mutex::new(Vec::with_capacity(total));

    thread::scope(|scope| {
        for worker in 0..workers {
            let queue = &queue;
            let finished = &finished;
            let job = &job;
            // Created here so worker events nest under the caller's spans.
            let span = debug_span!("batch_worker", worker);
            scope.spawn(move || {
                let _worker = span.enter();
                loop {
                    let Some((index, item)) = queue.lock().pop_front() else {
                        break;
                    };
                    let result = job(index, item);
                    if let Err(error) = &result {
                        warn!(index, %error, "batch item failed");
                    } else {
                        debug!(index, "batch item finished");
                    }
                    finished.lock().push(BatchOutcome { index, result });
                }
            });
        }
    });

    let mut outcomes = finished.into_inner();
    outcomes.sort_by_key(|outcome| outcome.index);
    let report = BatchReport { outcomes };
    info!(
        workers,
        succeeded = report.succeeded(),
        failed = report.failed(),
        "batch complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_are_isolated_and_order_is_kept() {
        let items: Vec<u32> = (0..20).collect();
        let report = run_batch(items, 4, |_, value| {
            if value % 5 == 0 {
                Err(format!("item {value} rejected"))
            } else {
                Ok(value * 2)
            }
        });

        assert_eq!(report.outcomes.len(), 20);
        assert!(
            report
                .outcomes
                .iter()
                .enumerate()
                .all(|(position, outcome)| outcome.index == position)
        );
        assert_eq!(report.failed(), 4);
        assert_eq!(report.succeeded(), 16);
        assert_eq!(report.outcomes[3].result, Ok(6));
        let failed: Vec<usize> = report.failures().map(|(index, _)| index).collect();
        assert_eq!(failed, vec![0, 5, 10, 15]);
    }

    #[test]
    fn empty_batch_reports_nothing() {
        let report = run_batch(Vec::<u8>::new(), 0, |_, value| Ok::<_, String>(value));
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn zero_workers_uses_available_parallelism() {
        assert!(resolve_workers(0) >= 1);
        assert_eq!(resolve_workers(3), 3);
    }
}
