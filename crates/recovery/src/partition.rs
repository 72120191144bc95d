//! Splitting the candidate space into per-worker chunks.

use crate::types::{Chunk, SearchSpace};

/// Partition `[0, max_password]` into at most `worker_count` chunks.
///
/// See [`partition_range`].
pub fn partition(max_password: u64, worker_count: usize) -> Vec<Chunk> {
    partition_range(0, max_password, worker_count)
}

/// Partition a search space into at most `worker_count` chunks.
pub fn partition_space(space: &SearchSpace, worker_count: usize) -> Vec<Chunk> {
    partition_range(space.lower(), space.upper(), worker_count)
}

/// Partition `[lower, upper]` into ordered, contiguous, non-overlapping chunks.
///
/// Every chunk but the last holds `floor(len / n)` candidates; the last one
/// absorbs the remainder and always ends at `upper`. The chunk count `n` is
/// `worker_count` clamped to the number of candidates, so no chunk is ever
/// empty.
///
/// # Examples
///
/// ```
/// use recovery::partition::partition;
///
/// let chunks = partition(9, 3);
/// assert_eq!(chunks.len(), 3);
/// assert_eq!((chunks[0].start, chunks[0].end), (0, 2));
/// assert_eq!((chunks[2].start, chunks[2].end), (6, 9));
/// ```
pub fn partition_range(lower: u64, upper: u64, worker_count: usize) -> Vec<Chunk> {
    if lower > upper {
        return Vec::new();
    }

    // u128 so that [0, u64::MAX] does not overflow
    let total = (upper - lower) as u128 + 1;
    let count = (worker_count.max(1) as u128).min(total);
    let chunk_size = total / count;

    (0..count)
        .map(|i| {
            let start = lower as u128 + i * chunk_size;
            let end = if i == count - 1 {
                upper as u128
            } else {
                start + chunk_size - 1
            };
            Chunk {
                id: i as usize,
                start: start as u64,
                end: end as u64,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(chunks: &[Chunk], lower: u64, upper: u64) {
        assert!(!chunks.is_empty());
        assert_eq!(chunks[0].start, lower);
        assert_eq!(chunks[chunks.len() - 1].end, upper);
        for chunk in chunks {
            assert!(chunk.start <= chunk.end, "empty chunk {:?}", chunk);
        }
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap in {:?}", pair);
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[test]
    fn test_partition_exact_cover_small_spaces() {
        for max_password in 0..60u64 {
            for workers in 1..=12usize {
                let chunks = partition(max_password, workers);
                assert_exact_cover(&chunks, 0, max_password);
                assert!(chunks.len() <= workers);
            }
        }
    }

    #[test]
    fn test_partition_eight_digit_space() {
        let chunks = partition(99_999_999, 4);
        assert_eq!(chunks.len(), 4);
        assert_eq!((chunks[0].start, chunks[0].end), (0, 24_999_999));
        assert_eq!((chunks[3].start, chunks[3].end), (75_000_000, 99_999_999));
    }

    #[test]
    fn test_partition_last_chunk_absorbs_remainder() {
        let chunks = partition(10, 3);
        // 11 candidates, chunk size 3
        assert_eq!((chunks[0].start, chunks[0].end), (0, 2));
        assert_eq!((chunks[1].start, chunks[1].end), (3, 5));
        assert_eq!((chunks[2].start, chunks[2].end), (6, 10));
    }

    #[test]
    fn test_partition_more_workers_than_candidates() {
        let chunks = partition(7, 10);
        assert_eq!(chunks.len(), 8);
        assert_exact_cover(&chunks, 0, 7);
        assert!(chunks.iter().all(|c| c.len() == 1));
    }

    #[test]
    fn test_partition_single_candidate() {
        let chunks = partition(0, 4);
        assert_eq!(chunks, vec![Chunk { id: 0, start: 0, end: 0 }]);
    }

    #[test]
    fn test_partition_offset_range() {
        let chunks = partition_range(1000, 1999, 3);
        assert_exact_cover(&chunks, 1000, 1999);
        assert_eq!(chunks[0].len(), 333);
        assert_eq!(chunks[2].len(), 334);
    }

    #[test]
    fn test_partition_widest_space() {
        let space = SearchSpace::full(19).unwrap();
        let chunks = partition_space(&space, 16);
        assert_exact_cover(&chunks, 0, space.upper());
    }

    #[test]
    fn test_partition_inverted_range() {
        assert!(partition_range(5, 4, 2).is_empty());
    }
}
