use cadence_core::{Error, Result};
use rand::Rng;
use std::collections::VecDeque;

/// Shuffled, class-balanced sequence of class indices.
///
/// Each class appears `ceil(trials / classes)` times before truncation to
/// `trials`, so class counts differ by at most one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalancedSequence {
    classes: usize,
    values: VecDeque<usize>,
}

impl BalancedSequence {
    pub fn new<R: Rng + ?Sized>(classes: usize, trials: usize, rng: &mut R) -> Result<Self> {
        Self::with_shuffle(classes, trials, |values| shuffle(values, rng))
    }

    /// Builds the sequence with a caller-provided in-place shuffle
    pub fn with_shuffle<F>(classes: usize, trials: usize, shuffle: F) -> Result<Self>
    where
        F: FnOnce(&mut [usize]),
    {
        if classes == 0 {
            return Err(Error::invalid("balanced sequence needs at least one class"));
        }
        if trials == 0 {
            return Err(Error::invalid("balanced sequence needs at least one trial"));
        }
        let repeats = trials.div_ceil(classes);
        let mut values: Vec<usize> = (0..repeats).flat_map(|_| 0..classes).take(trials).collect();
        shuffle(&mut values);
        Ok(Self {
            classes,
            values: values.into(),
        })
    }

    /// Pops the next class index
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Result<usize> {
        self.values.pop_front().ok_or(Error::ExhaustedSequence)
    }

    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn remaining(&self) -> impl Iterator<Item = usize> + '_ {
        self.values.iter().copied()
    }
}

/// Uniform in-place Fisher–Yates shuffle
pub fn shuffle<T, R: Rng + ?Sized>(values: &mut [T], rng: &mut R) {
    for i in (1..values.len()).rev() {
        let j = rng.random_range(0..=i);
        values.swap(i, j);
    }
}
