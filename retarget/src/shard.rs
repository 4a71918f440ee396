use crate::dataset::Subset;

/// Slice of a subset's skeletons owned by one worker.
///
/// Skeletons are striped round-robin: worker `w` of `W` owns indices
/// `w, w + W, w + 2W, ...` of the sorted skeleton list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerShard {
    pub index: usize,
    pub count: usize,
    pub seed: i32,
}

impl WorkerShard {
    /// Shard with the seed derived from the subset and the base seed.
    pub fn new(subset: Subset, index: usize, count: usize, base_seed: i32) -> Self {
        WorkerShard {
            index,
            count,
            seed: worker_seed(base_seed, index, subset),
        }
    }

    /// Shard with an explicitly provided seed, as received by a worker
    /// process.
    pub fn with_seed(index: usize, count: usize, seed: i32) -> Self {
        WorkerShard { index, count, seed }
    }

    /// Skeleton indices owned by this shard, ascending.
    pub fn indices(&self, total: usize) -> impl Iterator<Item = usize> {
        let step = self.count.max(1);
        (self.index..total).step_by(step)
    }

    /// Seed for sampling animations of the skeleton at `index`.
    pub fn skeleton_seed(&self, index: usize) -> i32 {
        self.seed.wrapping_add(index as i32)
    }
}

/// Clamps worker count to at least one.
pub fn clamp_workers(requested: i64) -> usize {
    if requested < 1 {
        tracing::warn!(
            "workers must be >= 1, clamping to 1 (was {})",
            requested
        );
        1
    } else {
        requested as usize
    }
}

/// `base + index * 1000 + hash(subset) % 1000`, wrapping.
pub fn worker_seed(base_seed: i32, index: usize, subset: Subset) -> i32 {
    let salt = (subset_hash(subset.as_str()) % 1000) as i32;
    base_seed
        .wrapping_add((index as i32).wrapping_mul(1000))
        .wrapping_add(salt)
}

/// Case-insensitive 32-bit FNV-1a.
/// Stable across processes, platforms and toolchains.
pub fn subset_hash(name: &str) -> u32 {
    const OFFSET: u32 = 0x811c_9dc5;
    const PRIME: u32 = 0x0100_0193;

    name.bytes().fold(OFFSET, |hash, byte| {
        (hash ^ u32::from(byte.to_ascii_lowercase())).wrapping_mul(PRIME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shards_cover_every_index_once() {
        for total in 0..20 {
            for workers in 1..6 {
                let mut seen = vec![0; total];
                for w in 0..workers {
                    let shard = WorkerShard::new(Subset::Train, w, workers, 0);
                    for i in shard.indices(total) {
                        seen[i] += 1;
                    }
                }
                assert!(seen.iter().all(|&n| n == 1), "{} {}", total, workers);
            }
        }
    }

    #[test]
    fn two_workers_split_two_skeletons() {
        let a = WorkerShard::new(Subset::Train, 0, 2, 0);
        let b = WorkerShard::new(Subset::Train, 1, 2, 0);
        assert_eq!(a.indices(2).collect::<Vec<_>>(), vec![0]);
        assert_eq!(b.indices(2).collect::<Vec<_>>(), vec![1]);

        let single = WorkerShard::new(Subset::Train, 0, 1, 0);
        assert_eq!(single.indices(2).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn seeds_follow_formula() {
        let salt = (subset_hash("val") % 1000) as i32;
        assert_eq!(worker_seed(5, 0, Subset::Val), 5 + salt);
        assert_eq!(worker_seed(5, 3, Subset::Val), 5 + 3000 + salt);

        let shard = WorkerShard::new(Subset::Val, 3, 4, 5);
        assert_eq!(shard.skeleton_seed(7), 5 + 3000 + salt + 7);
        assert_eq!(
            worker_seed(i32::MAX, 1, Subset::Val),
            i32::MAX.wrapping_add(1000 + salt)
        );
    }

    #[test]
    fn hash_ignores_case() {
        assert_eq!(subset_hash("Train"), subset_hash("train"));
        assert_ne!(subset_hash("train"), subset_hash("test"));
    }

    #[test]
    fn worker_count_is_clamped() {
        assert_eq!(clamp_workers(0), 1);
        assert_eq!(clamp_workers(-3), 1);
        assert_eq!(clamp_workers(4), 4);
    }
}
