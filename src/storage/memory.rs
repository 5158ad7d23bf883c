use std::collections::{BTreeMap, VecDeque};
use std::ops::RangeBounds;

use crate::{
    error::Result,
    storage::engine::{Engine, EngineIterator},
};

/// In-memory storage engine, a sorted map of raw key-value pairs. Backs
/// runs without a catalog file and most of the test suite.
pub struct MemoryEngine {
    data: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }
}

impl Engine for MemoryEngine {
    type EngineIterator<'a> = MemoryEngineIterator;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.data.insert(key, value);
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        Ok(self.data.get(&key).cloned())
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.data.remove(&key);
        Ok(())
    }

    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        // snapshot the range up front; the map is small and this keeps the
        // iterator free of borrows
        let pairs = self
            .data
            .range(range)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        MemoryEngineIterator { pairs }
    }
}

/// Owned snapshot of one scanned range, traversable from both ends
pub struct MemoryEngineIterator {
    pairs: VecDeque<(Vec<u8>, Vec<u8>)>,
}

impl Iterator for MemoryEngineIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.pairs.pop_front().map(Ok)
    }
}

impl DoubleEndedIterator for MemoryEngineIterator {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.pairs.pop_back().map(Ok)
    }
}

impl EngineIterator for MemoryEngineIterator {}
