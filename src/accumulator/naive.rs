//! Uncompensated running sum

use num_traits::Float;

use super::Accumulator;

/// Plain `sum += v` accumulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NaiveState<T> {
    pub sum: T,
}

impl<T: Float> Accumulator<T> for NaiveState<T> {
    #[inline]
    fn start() -> Self {
        NaiveState { sum: T::zero() }
    }

    #[inline]
    fn accumulate(self, value: T) -> Self {
        NaiveState {
            sum: self.sum + value,
        }
    }

    #[inline]
    fn value(&self) -> T {
        self.sum
    }
}
