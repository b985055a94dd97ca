//! Kahan compensated summation
//!
//! Tracks the low-order bits lost by each addition in a carry term and
//! feeds them back into the next addend, so the rounding error of the
//! final sum is bounded independently of the number of terms.

use num_traits::Float;

use super::Accumulator;

/// Running sum plus compensation carry
///
/// Owned by exactly one accumulation loop; each step consumes the state
/// and returns a fresh one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KahanState<T> {
    /// Running sum
    pub sum: T,
    /// Compensation term: the (negated) error of the last addition
    pub carry: T,
}

impl<T: Float> KahanState<T> {
    /// The initial state `(0, 0)`
    pub fn new() -> Self {
        Self {
            sum: T::zero(),
            carry: T::zero(),
        }
    }
}

impl<T: Float> Default for KahanState<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// One Kahan step
///
/// The operation order is fixed; reordering it changes the rounding and
/// therefore the result.
///
/// ```text
/// y  = v - c
/// t  = sum + y
/// c' = (t - sum) - y
/// sum' = t
/// ```
#[inline]
pub fn kahan_step<T: Float>(state: KahanState<T>, value: T) -> KahanState<T> {
    let y = value - state.carry;
    let t = state.sum + y;
    let carry = (t - state.sum) - y;
    KahanState { sum: t, carry }
}

impl<T: Float> Accumulator<T> for KahanState<T> {
    #[inline]
    fn start() -> Self {
        Self::new()
    }

    #[inline]
    fn accumulate(self, value: T) -> Self {
        kahan_step(self, value)
    }

    #[inline]
    fn value(&self) -> T {
        self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_matches_hand_computation() {
        let state = KahanState { sum: 1.0f32, carry: 0.0 };
        let next = kahan_step(state, 1.0e-8);

        // 1e-8 is below half an ulp of 1.0f32, so the sum is unchanged and
        // the whole addend is carried.
        assert_eq!(next.sum, 1.0);
        assert_eq!(next.carry, -1.0e-8);
    }

    #[test]
    fn test_state_is_not_shared() {
        let base = KahanState::<f64>::new();
        let a = base.accumulate(1.0).accumulate(2.0);
        let b = base.accumulate(10.0);

        assert_eq!(base, KahanState::new());
        assert_eq!(a.value(), 3.0);
        assert_eq!(b.value(), 10.0);
    }

    #[test]
    fn test_tenths_f32() {
        let sum = KahanState::sum_iter(std::iter::repeat(0.1f32).take(1000));
        assert!((sum - 100.0).abs() < 1e-5);
    }

    #[test]
    fn test_nan_propagates() {
        let sum = KahanState::sum_iter([1.0f32, f32::NAN, 2.0]);
        assert!(sum.is_nan());
    }
}
