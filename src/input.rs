//! Input vectors for the reduction pipeline

use aligned_vec::AVec;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Alignment of the host-side input buffer, in bytes
pub const INPUT_ALIGN: usize = 64;

/// Immutable, ordered sequence of `f32` values
///
/// The buffer is cache-line aligned since it is handed directly to the
/// device transfer primitives. There is no mutable access once built, so
/// every reducer sees the same values in the same order.
#[derive(Debug, Clone)]
pub struct InputVector {
    values: AVec<f32>,
}

impl InputVector {
    /// Pseudo-random values in `[0, 1)` from a fixed seed
    ///
    /// The same `(len, seed)` always yields the same vector.
    pub fn uniform(len: usize, seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        Self {
            values: AVec::from_iter(INPUT_ALIGN, (0..len).map(|_| rng.gen::<f32>())),
        }
    }

    /// `len` copies of `value`
    pub fn constant(len: usize, value: f32) -> Self {
        Self {
            values: AVec::from_iter(INPUT_ALIGN, std::iter::repeat(value).take(len)),
        }
    }

    /// Take ownership of existing values, keeping their order
    pub fn from_values(values: Vec<f32>) -> Self {
        Self {
            values: AVec::from_iter(INPUT_ALIGN, values),
        }
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the vector has no elements
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read-only view of the values
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Size of the buffer in bytes
    pub fn size_bytes(&self) -> usize {
        self.values.len() * std::mem::size_of::<f32>()
    }
}

impl From<Vec<f32>> for InputVector {
    fn from(values: Vec<f32>) -> Self {
        Self::from_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_is_reproducible() {
        let a = InputVector::uniform(4096, 10);
        let b = InputVector::uniform(4096, 10);
        let c = InputVector::uniform(4096, 11);
        assert_eq!(a.as_slice(), b.as_slice());
        assert_ne!(a.as_slice(), c.as_slice());
    }

    #[test]
    fn test_uniform_range() {
        let input = InputVector::uniform(10_000, 42);
        assert!(input.as_slice().iter().all(|&v| (0.0..1.0).contains(&v)));
    }

    #[test]
    fn test_buffer_alignment() {
        let input = InputVector::constant(100, 1.0);
        assert_eq!(input.as_slice().as_ptr() as usize % INPUT_ALIGN, 0);
        assert_eq!(input.size_bytes(), 400);
    }

    #[test]
    fn test_from_values_keeps_order() {
        let input = InputVector::from(vec![3.0, 1.0, 2.0]);
        assert_eq!(input.as_slice(), &[3.0, 1.0, 2.0]);
        assert_eq!(input.len(), 3);
        assert!(!input.is_empty());
    }
}
