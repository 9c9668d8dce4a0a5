//! Injectable randomness.
//!
//! Every random decision in the fragmenter and the timing model goes through a
//! [`RandomSource`], so a seeded or fixed source makes a run reproducible.

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// A source of uniform draws in `[0, 1)`.
pub trait RandomSource: Send {
    fn next_f64(&mut self) -> f64;

    /// Returns true with probability `probability`.
    fn chance(&mut self, probability: f64) -> bool {
        self.next_f64() < probability
    }

    /// Picks an index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize {
        let picked = (self.next_f64() * len as f64) as usize;
        picked.min(len.saturating_sub(1))
    }
}

/// Random source shared between the sequencer's timer tasks.
pub type SharedRandom = Arc<Mutex<Box<dyn RandomSource>>>;

pub fn shared(source: impl RandomSource + 'static) -> SharedRandom {
    Arc::new(Mutex::new(Box::new(source)))
}

/// Production source seeded from OS entropy.
pub struct EntropyRandom(StdRng);

impl EntropyRandom {
    pub fn new() -> Self {
        Self(StdRng::from_entropy())
    }
}

impl Default for EntropyRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for EntropyRandom {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Deterministic pseudo-random source.
pub struct SeededRandom(StdRng);

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&mut self) -> f64 {
        self.0.gen::<f64>()
    }
}

/// Replays a fixed list of draws, then keeps repeating the last one.
///
/// An empty list always yields `0.0`. Values are clamped into `[0, 1)`.
#[derive(Debug, Clone)]
pub struct FixedRandom {
    values: Vec<f64>,
    cursor: usize,
}

impl FixedRandom {
    pub fn new(values: impl Into<Vec<f64>>) -> Self {
        Self {
            values: values.into(),
            cursor: 0,
        }
    }

    /// A source that always returns `value`.
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }

    /// Number of draws taken so far.
    pub fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for FixedRandom {
    fn next_f64(&mut self) -> f64 {
        if self.values.is_empty() {
            self.cursor += 1;
            return 0.0;
        }
        let last = self.values.len() - 1;
        let value = self.values[self.cursor.min(last)];
        self.cursor += 1;
        value.clamp(0.0, 0.999_999_999)
    }
}
