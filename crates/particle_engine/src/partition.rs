//! Split a range of work into contiguous chunks, one per worker.

use std::ops::Range;

/// Split `[0, total)` into at most `num_threads` contiguous, non-overlapping, half-open ranges.
///
/// Every range is `ceil(total / num_threads)` long except possibly the last, which may be
/// shorter. Empty ranges are omitted, so there can be fewer ranges than threads, and none at
/// all when `total` is 0. A `num_threads` of 0 is treated as 1.
///
/// The same split is used for emission batches and for the update, collision and compaction
/// phases, so that chunk `n` always refers to the same slice of particles within a tick.
#[must_use]
pub fn partition(total: usize, num_threads: usize) -> Vec<Range<usize>> {
    let num_threads = num_threads.max(1);
    let chunk = total.div_ceil(num_threads);
    if chunk == 0 {
        return Vec::new();
    }

    (0..total)
        .step_by(chunk)
        .map(|start| start..total.min(start + chunk))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    fn assert_covers(total: usize, num_threads: usize) {
        let ranges = partition(total, num_threads);
        let chunk = total.div_ceil(num_threads);
        assert!(ranges.len() <= num_threads);

        let mut expected_start = 0;
        let mut short_ranges = 0;
        for range in &ranges {
            assert_eq!(range.start, expected_start, "{total}/{num_threads}: {ranges:?}");
            assert!(!range.is_empty());
            if range.len() < chunk {
                short_ranges += 1;
            }
            expected_start = range.end;
        }
        assert_eq!(expected_start, total);
        assert!(short_ranges <= 1);
        if let Some(last) = ranges.last() {
            assert!(ranges[..ranges.len() - 1].iter().all(|range| range.len() == chunk));
            assert!(last.len() <= chunk);
        }
    }

    #[test]
    fn covers_everything_exactly_once() {
        for total in 0..60 {
            for num_threads in 1..12 {
                assert_covers(total, num_threads);
            }
        }
    }

    #[test]
    fn even_split() {
        assert_eq!(partition(12, 3), vec![0..4, 4..8, 8..12]);
    }

    #[test]
    fn short_last_chunk() {
        assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..9, 9..10]);
    }

    #[test]
    fn fewer_ranges_than_threads() {
        // ceil(5 / 4) = 2, so the 4th thread has nothing to do
        assert_eq!(partition(5, 4), vec![0..2, 2..4, 4..5]);
        assert_eq!(partition(2, 8), vec![0..1, 1..2]);
    }

    #[test]
    fn nothing_to_do() {
        assert!(partition(0, 4).is_empty());
    }

    #[test]
    fn zero_threads_is_one_thread() {
        assert_eq!(partition(7, 0), vec![0..7]);
    }

    #[test]
    fn deterministic() {
        assert_eq!(partition(1000, 7), partition(1000, 7));
    }
}
