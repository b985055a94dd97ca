//! Running-sum primitives used by every reducer in the crate
//!
//! Two accumulation strategies are provided: naive left-to-right addition
//! and Kahan compensated summation. Both are value types threaded through
//! each step (`state = state.accumulate(v)`), so one accumulation never
//! shares state with another and the same code can run per group on any
//! thread.

pub mod kahan;
pub mod naive;

use num_traits::Float;
use serde::{Deserialize, Serialize};

pub use kahan::{kahan_step, KahanState};
pub use naive::NaiveState;

/// Trait for running-sum states
///
/// Implementations are small `Copy` values. `accumulate` consumes the
/// current state and returns the next one; there is no interior mutation.
pub trait Accumulator<T>: Copy
where
    T: Float,
{
    /// The empty state (sum of no elements)
    fn start() -> Self;

    /// Add one value, returning the updated state
    fn accumulate(self, value: T) -> Self;

    /// The current sum
    fn value(&self) -> T;

    /// Fold an entire sequence, in iteration order, starting from `start()`
    fn sum_iter<I>(values: I) -> T
    where
        I: IntoIterator<Item = T>,
    {
        values
            .into_iter()
            .fold(Self::start(), |state, v| state.accumulate(v))
            .value()
    }
}

/// Which accumulation strategy a reducer applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compensation {
    /// Plain `sum += v`
    Plain,
    /// Kahan compensated summation
    Kahan,
}

impl Compensation {
    /// Both strategies, in report order
    pub const ALL: [Compensation; 2] = [Compensation::Plain, Compensation::Kahan];
}

/// Sum a slice left to right with the chosen strategy
///
/// # Examples
///
/// ```
/// use groupsum::accumulator::{sum_slice, Compensation};
///
/// let values = [1.0f32, 2.0, 3.0];
/// assert_eq!(sum_slice(&values, Compensation::Plain), 6.0);
/// assert_eq!(sum_slice(&values, Compensation::Kahan), 6.0);
/// ```
pub fn sum_slice<T>(values: &[T], compensation: Compensation) -> T
where
    T: Float,
{
    match compensation {
        Compensation::Plain => NaiveState::sum_iter(values.iter().copied()),
        Compensation::Kahan => KahanState::sum_iter(values.iter().copied()),
    }
}
