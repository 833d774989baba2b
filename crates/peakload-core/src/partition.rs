//! Transaction-index partitioning across a trial's worker pool.

use std::ops::Range;

/// Splits `[0, candidate_tps)` into one contiguous slice per worker.
///
/// Every worker receives `candidate_tps / worker_count` indices; the
/// last worker additionally absorbs the remainder. The returned ranges
/// are pairwise disjoint and their union covers the interval exactly,
/// so the slice lengths sum to `candidate_tps`; the aggregator's
/// completion trigger depends on that equality.
#[must_use]
pub fn partition(candidate_tps: u64, worker_count: u64) -> Vec<Range<u64>> {
    let each_load = candidate_tps / worker_count;
    let remainder = candidate_tps % worker_count;

    (0..worker_count)
        .map(|k| {
            let start = each_load * k;
            let mut end = each_load * (k + 1);
            if k == worker_count - 1 {
                end += remainder;
            }
            start..end
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_interval_exactly() {
        for candidate_tps in 1..=40 {
            for worker_count in 1..=8 {
                let ranges = partition(candidate_tps, worker_count);
                assert_eq!(ranges.len(), worker_count as usize);

                let mut indices: Vec<u64> = ranges.iter().cloned().flatten().collect();
                indices.sort_unstable();
                let expected: Vec<u64> = (0..candidate_tps).collect();
                assert_eq!(
                    indices, expected,
                    "gap or overlap for tps={candidate_tps} workers={worker_count}"
                );
            }
        }
    }

    #[test]
    fn last_worker_absorbs_remainder() {
        let ranges = partition(10, 3);
        assert_eq!(ranges, vec![0..3, 3..6, 6..10]);

        let each_load = 10 / 3;
        let remainder = 10 % 3;
        let last = ranges.last().unwrap();
        assert_eq!(last.end - last.start, each_load + remainder);
    }

    #[test]
    fn fewer_transactions_than_workers() {
        // each_load is zero; everything lands on the last worker
        let ranges = partition(5, 8);
        assert!(ranges[..7].iter().all(|r| r.is_empty()));
        assert_eq!(ranges[7], 0..5);
    }

    #[test]
    fn single_worker_takes_all() {
        assert_eq!(partition(100, 1), vec![0..100]);
    }
}
