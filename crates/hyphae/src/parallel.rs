//! Bulk data-parallel helper
//!
//! Independent of the bus. Handler bodies can use [`parallel_for`] to split
//! a numeric range across short-lived scoped threads and block until every
//! chunk has run.

use std::ops::Range;
use std::thread;

/// Number of hardware threads, falling back to 1 when unknown
pub fn available_concurrency() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Split `[begin, end)` into `min(hint, size)` contiguous chunks
///
/// Chunk sizes differ by at most one; the first `size % chunks` chunks carry
/// the extra element. An empty or inverted range yields no chunks.
pub fn partition(begin: usize, end: usize, hint: usize) -> Vec<Range<usize>> {
    let size = end.saturating_sub(begin);
    if size == 0 {
        return Vec::new();
    }

    let chunks = hint.clamp(1, size);
    let interval = size / chunks;
    let mut residual = size % chunks;

    let mut ranges = Vec::with_capacity(chunks);
    let mut start = begin;
    while start < end {
        let mut stop = start + interval;
        if residual > 0 {
            stop += 1;
            residual -= 1;
        }
        ranges.push(start..stop);
        start = stop;
    }
    ranges
}

/// Run `job(chunk_begin, chunk_end)` over `[begin, end)` in parallel
///
/// With a hint below 2, or fewer than 2 elements, the job runs once on the
/// calling thread and no thread is spawned. Otherwise each chunk from
/// [`partition`] runs on its own scoped thread and the call returns after all
/// of them finish. A panic in any chunk is propagated to the caller.
pub fn parallel_for<F>(begin: usize, end: usize, job: F, concurrency_hint: usize)
where
    F: Fn(usize, usize) + Sync,
{
    if end <= begin {
        return;
    }

    let size = end - begin;
    if concurrency_hint < 2 || size < 2 {
        job(begin, end);
        return;
    }

    let ranges = partition(begin, end, concurrency_hint);
    tracing::trace!(begin, end, chunks = ranges.len(), "parallel_for");

    let job = &job;
    thread::scope(|scope| {
        for range in ranges {
            scope.spawn(move || job(range.start, range.end));
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_partition_near_equal() {
        let ranges = partition(0, 1000, 4);
        assert_eq!(ranges, vec![0..250, 250..500, 500..750, 750..1000]);

        let ranges = partition(10, 20, 3);
        assert_eq!(ranges, vec![10..14, 14..17, 17..20]);
    }

    #[test]
    fn test_partition_more_threads_than_elements() {
        let ranges = partition(0, 3, 8);
        assert_eq!(ranges, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_partition_empty() {
        assert!(partition(5, 5, 4).is_empty());
        assert!(partition(7, 5, 4).is_empty());
    }

    #[test]
    fn test_parallel_for_covers_range_once() {
        let hits: Vec<AtomicUsize> = (0..1000).map(|_| AtomicUsize::new(0)).collect();
        let chunks = Mutex::new(Vec::new());

        parallel_for(
            0,
            1000,
            |b, e| {
                chunks.lock().push(b..e);
                for hit in &hits[b..e] {
                    hit.fetch_add(1, Ordering::Relaxed);
                }
            },
            4,
        );

        assert!(hits.iter().all(|h| h.load(Ordering::Relaxed) == 1));

        let mut chunks = chunks.into_inner();
        chunks.sort_by_key(|r| r.start);
        assert_eq!(chunks.len(), 4);
        let sizes: Vec<usize> = chunks.iter().map(|r| r.len()).collect();
        let spread = sizes.iter().max().unwrap() - sizes.iter().min().unwrap();
        assert!(spread <= 1);
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_single_element_runs_inline() {
        let caller = thread::current().id();
        let seen = Mutex::new(None);

        parallel_for(0, 1, |b, e| *seen.lock() = Some((b, e, thread::current().id())), 8);

        assert_eq!(seen.into_inner(), Some((0, 1, caller)));
    }

    #[test]
    fn test_low_hint_runs_inline() {
        let caller = thread::current().id();
        let calls = Mutex::new(Vec::new());

        parallel_for(3, 50, |b, e| calls.lock().push((b, e, thread::current().id())), 1);

        assert_eq!(calls.into_inner(), vec![(3, 50, caller)]);
    }

    #[test]
    fn test_available_concurrency_positive() {
        assert!(available_concurrency() >= 1);
    }
}
