//! Bounded, most-recent-first light history.

use serde::Serialize;
use std::fmt;

/// Recent calibrated light samples, newest at index 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LightHistory {
    samples: Vec<u32>,
}

impl LightHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend a sample and evict the oldest ones beyond `capacity`.
    pub fn push(&mut self, intensity: u32, capacity: usize) {
        self.samples.insert(0, intensity);
        self.samples.truncate(capacity);
    }

    /// Drop samples beyond `capacity` (used when the capacity shrinks).
    pub fn shrink_to(&mut self, capacity: usize) {
        self.samples.truncate(capacity);
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }

    /// True once at least `n` samples are stored.
    pub fn sufficient_for(&self, n: usize) -> bool {
        self.samples.len() >= n
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.samples
    }
}

impl fmt::Display for LightHistory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_is_most_recent_first() {
        let mut history = LightHistory::new();
        history.push(1, 5);
        history.push(2, 5);
        history.push(3, 5);
        assert_eq!(history.as_slice(), &[3, 2, 1]);
    }

    #[test]
    fn test_push_beyond_capacity_evicts_oldest() {
        let mut history = LightHistory::new();
        for value in 0..20 {
            history.push(value, 4);
            assert!(history.len() <= 4);
            assert_eq!(history.as_slice()[0], value);
        }
        assert_eq!(history.as_slice(), &[19, 18, 17, 16]);
    }

    #[test]
    fn test_sufficient_for_and_reset() {
        let mut history = LightHistory::new();
        assert!(history.sufficient_for(0));
        assert!(!history.sufficient_for(1));

        history.push(7, 3);
        history.push(8, 3);
        assert!(history.sufficient_for(2));
        assert!(!history.sufficient_for(3));

        history.reset();
        assert!(history.is_empty());
    }

    #[test]
    fn test_shrink_to() {
        let mut history = LightHistory::new();
        for value in 0..6 {
            history.push(value, 10);
        }
        history.shrink_to(2);
        assert_eq!(history.as_slice(), &[5, 4]);
    }

    #[test]
    fn test_display() {
        let mut history = LightHistory::new();
        history.push(5, 3);
        history.push(9, 3);
        assert_eq!(history.to_string(), "[9, 5]");
    }
}
