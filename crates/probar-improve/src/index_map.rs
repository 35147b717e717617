//! Original ↔ runtime step index mapping.
//!
//! Candidates and findings are keyed by the step's index in the recorded test.
//! Once failed steps are removed or assertions inserted, the runtime sequence
//! diverges; this map is the only way positions are translated.

use serde::{Deserialize, Serialize};

/// Bidirectional map between original and runtime step indexes
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepIndexMap {
    /// Original index of each runtime step; `None` for inserted steps
    runtime_to_original: Vec<Option<usize>>,
}

impl StepIndexMap {
    /// Identity map over `len` steps
    #[must_use]
    pub fn identity(len: usize) -> Self {
        Self {
            runtime_to_original: (0..len).map(Some).collect(),
        }
    }

    /// Number of runtime steps
    #[must_use]
    pub fn len(&self) -> usize {
        self.runtime_to_original.len()
    }

    /// Whether there are no runtime steps
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runtime_to_original.is_empty()
    }

    /// Drop the runtime step holding `original`; returns whether it was present
    pub fn remove_original(&mut self, original: usize) -> bool {
        match self.runtime_of(original) {
            Some(runtime) => {
                self.runtime_to_original.remove(runtime);
                true
            }
            None => false,
        }
    }

    /// Record an inserted step directly after `runtime`, returning its runtime index
    pub fn insert_after(&mut self, runtime: usize) -> usize {
        let at = (runtime + 1).min(self.runtime_to_original.len());
        self.runtime_to_original.insert(at, None);
        at
    }

    /// Runtime index of an original step, if it is still present
    #[must_use]
    pub fn runtime_of(&self, original: usize) -> Option<usize> {
        self.runtime_to_original
            .iter()
            .position(|o| *o == Some(original))
    }

    /// Original index of a runtime step; `None` for inserted steps
    #[must_use]
    pub fn original_of(&self, runtime: usize) -> Option<usize> {
        self.runtime_to_original.get(runtime).copied().flatten()
    }

    /// Last runtime index of the block starting at original step `original`.
    ///
    /// Inserted steps that follow it belong to the block, so a new insertion
    /// lands after earlier ones.
    #[must_use]
    pub fn block_end(&self, original: usize) -> Option<usize> {
        let start = self.runtime_of(original)?;
        let extra = self.runtime_to_original[start + 1..]
            .iter()
            .take_while(|o| o.is_none())
            .count();
        Some(start + extra)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity() {
        let map = StepIndexMap::identity(3);
        assert_eq!(map.len(), 3);
        assert_eq!(map.runtime_of(2), Some(2));
        assert_eq!(map.original_of(1), Some(1));
        assert_eq!(map.original_of(3), None);
    }

    #[test]
    fn test_remove_shifts_later_steps() {
        let mut map = StepIndexMap::identity(4);
        assert!(map.remove_original(1));
        assert!(!map.remove_original(1));
        assert_eq!(map.runtime_of(1), None);
        assert_eq!(map.runtime_of(2), Some(1));
        assert_eq!(map.original_of(2), Some(3));
    }

    #[test]
    fn test_insertions_stack_after_block() {
        let mut map = StepIndexMap::identity(2);
        let first = map.insert_after(map.block_end(0).unwrap());
        assert_eq!(first, 1);
        let second = map.insert_after(map.block_end(0).unwrap());
        assert_eq!(second, 2);
        assert_eq!(map.runtime_of(1), Some(3));
        assert_eq!(map.original_of(1), None);
        assert_eq!(map.block_end(1), Some(3));
    }
}
