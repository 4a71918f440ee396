//! Seeded sampling that gives the same answer on every machine.

use rand::{Error, Rng, RngCore};

/// 32-bit linear congruential generator.
///
/// Same seed gives the same sequence on every platform.
#[derive(Clone, Debug)]
pub struct RandomStream {
    seed: i32,
}

impl RandomStream {
    pub fn new(seed: i32) -> Self {
        RandomStream { seed }
    }

    fn mutate(&mut self) -> u32 {
        self.seed = self
            .seed
            .wrapping_mul(196_314_165)
            .wrapping_add(907_633_515);
        self.seed as u32
    }
}

impl RngCore for RandomStream {
    fn next_u32(&mut self) -> u32 {
        self.mutate()
    }

    fn next_u64(&mut self) -> u64 {
        let lo = u64::from(self.next_u32());
        let hi = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Picks `count` items out of `items` with a seeded Fisher-Yates shuffle.
///
/// When `count` covers the whole input the input is returned as-is,
/// without shuffling. Draws are 32-bit whatever the pointer width.
pub fn random_subset<T: Clone>(items: &[T], count: usize, seed: i32) -> Vec<T> {
    if count >= items.len() {
        return items.to_vec();
    }

    let mut result = items.to_vec();
    let mut rng = RandomStream::new(seed);
    for i in (1..result.len()).rev() {
        let j = rng.gen_range(0..=i as u32);
        result.swap(i, j as usize);
    }
    result.truncate(count);
    result
}
