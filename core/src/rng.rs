//! Deterministic random number generation.
//!
//! RULE: Nothing in the kernel may call a platform RNG.  All randomness
//! flows through one `KernelRng` seeded from the scene's master seed, so a
//! run replays identically from the same seed.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

pub struct KernelRng {
    inner: Pcg64Mcg,
}

impl KernelRng {
    pub fn new(seed: u64) -> KernelRng {
        KernelRng {
            inner: Pcg64Mcg::seed_from_u64(seed),
        }
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Roll a u64 in [0, n).
    pub fn below(&mut self, n: u64) -> u64 {
        use rand::RngCore;
        assert!(n > 0, "n must be > 0");
        self.inner.next_u64() % n
    }

    /// Bernoulli trial: true with probability p.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one element of a non-empty slice.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.below(items.len() as u64) as usize]
    }
}
