//! Mutable reference cells

use super::error::{EvalResult, Fault};
use crate::keys::RefKey;
use std::collections::HashMap;

/// Reference cells keyed by opaque ref keys
#[derive(Debug, Clone)]
pub struct ReferenceStore<N> {
    cells: HashMap<RefKey, N>,
}

impl<N: Clone> ReferenceStore<N> {
    pub fn new() -> Self {
        ReferenceStore { cells: HashMap::new() }
    }

    /// Store a value under a fresh key
    pub fn create(&mut self, value: N) -> RefKey {
        let key = RefKey::new();
        self.cells.insert(key, value);
        key
    }

    pub fn get(&self, key: &RefKey) -> EvalResult<N> {
        self.cells.get(key).cloned().ok_or_else(Fault::ref_deleted)
    }

    /// Overwrite a cell; a deleted key is re-inserted
    pub fn set(&mut self, key: RefKey, value: N) {
        self.cells.insert(key, value);
    }

    pub fn delete(&mut self, key: &RefKey) {
        self.cells.remove(key);
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl<N: Clone> Default for ReferenceStore<N> {
    fn default() -> Self {
        Self::new()
    }
}
