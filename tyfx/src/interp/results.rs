//! Append-only result store

use crate::keys::ResultKey;
use crate::oracle::Oracle;
use indexmap::IndexMap;

/// One computed output
#[derive(Debug, Clone)]
pub struct ResultEntry<N> {
    pub key: ResultKey,
    pub output: N,
}

/// Insertion-ordered outputs of the run; entries are never removed
#[derive(Debug, Clone)]
pub struct ResultStore<N> {
    entries: IndexMap<ResultKey, ResultEntry<N>>,
}

impl<N: Clone> ResultStore<N> {
    pub fn new() -> Self {
        ResultStore {
            entries: IndexMap::new(),
        }
    }

    /// Record an output and register its slot with the oracle
    pub fn create<O: Oracle<Node = N>>(&mut self, oracle: &mut O, output: N) -> ResultKey {
        let key = ResultKey::new();
        oracle.synthesize_result_slot(key, output.clone());
        self.entries.insert(key, ResultEntry { key, output });
        key
    }

    /// Node referring to an entry's output
    pub fn project<O: Oracle<Node = N>>(&self, oracle: &O, key: ResultKey) -> N {
        oracle.project(key)
    }

    pub fn get(&self, key: &ResultKey) -> Option<&ResultEntry<N>> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResultEntry<N>> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Clone> Default for ResultStore<N> {
    fn default() -> Self {
        Self::new()
    }
}
