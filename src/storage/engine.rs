use std::ops::{Bound, RangeBounds};

use crate::error::Result;

/// Raw key-value store underneath the SQL layer. Keys and values are
/// opaque byte strings and scans run in key order.
pub trait Engine {
    type EngineIterator<'a>: EngineIterator
    where
        Self: 'a;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()>;
    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>>;
    fn delete(&mut self, key: Vec<u8>) -> Result<()>;
    fn scan(&mut self, range: impl RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_>;

    /// Flushes buffered writes to durable storage; a no-op for engines
    /// without a backing file
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    /// Prefix scan using lexicographic ordering
    ///
    /// Converts prefix scan to range scan by incrementing the last byte that
    /// can carry. For example, prefix "apple" becomes range ["apple", "applf");
    /// a prefix of all 0xff bytes has no upper bound.
    fn scan_prefix(&mut self, prefix: Vec<u8>) -> Self::EngineIterator<'_> {
        let start = Bound::Included(prefix.clone());
        let mut bound_prefix = prefix;
        let end = match bound_prefix.iter().rposition(|b| *b != u8::MAX) {
            Some(i) => {
                bound_prefix[i] += 1;
                bound_prefix.truncate(i + 1);
                Bound::Excluded(bound_prefix)
            }
            None => Bound::Unbounded,
        };
        self.scan((start, end))
    }
}

/// Storage engine iterator trait (supports reverse traversal)
pub trait EngineIterator: DoubleEndedIterator<Item = Result<(Vec<u8>, Vec<u8>)>> {}

#[cfg(test)]
mod tests {
    use super::Engine;
    use crate::{
        error::Result,
        storage::{disk::DiskEngine, memory::MemoryEngine},
    };
    use std::ops::Bound;

    fn keys_of(iter: impl Iterator<Item = Result<(Vec<u8>, Vec<u8>)>>) -> Result<Vec<Vec<u8>>> {
        iter.map(|r| r.map(|(key, _)| key)).collect()
    }

    fn test_point_ops(mut eng: impl Engine) -> Result<()> {
        assert_eq!(eng.get(b"row:17".to_vec())?, None);

        eng.set(b"row:17".to_vec(), b"sorento".to_vec())?;
        assert_eq!(eng.get(b"row:17".to_vec())?, Some(b"sorento".to_vec()));

        // overwrite keeps the latest value
        eng.set(b"row:17".to_vec(), b"altima".to_vec())?;
        assert_eq!(eng.get(b"row:17".to_vec())?, Some(b"altima".to_vec()));

        eng.delete(b"row:17".to_vec())?;
        assert_eq!(eng.get(b"row:17".to_vec())?, None);

        // deleting a missing key is not an error
        eng.delete(b"row:404".to_vec())?;

        // empty keys and empty values are valid
        eng.set(b"".to_vec(), vec![])?;
        assert_eq!(eng.get(b"".to_vec())?, Some(vec![]));
        Ok(())
    }

    fn test_range_scan(mut eng: impl Engine) -> Result<()> {
        eng.set(b"index:2".to_vec(), vec![2])?;
        eng.set(b"row:1".to_vec(), vec![11])?;
        eng.set(b"index:1".to_vec(), vec![1])?;
        eng.set(b"table:a".to_vec(), vec![31])?;
        eng.set(b"row:2".to_vec(), vec![12])?;

        let keys = keys_of(eng.scan((
            Bound::Included(b"index:".to_vec()),
            Bound::Excluded(b"row:".to_vec()),
        )))?;
        assert_eq!(keys, vec![b"index:1".to_vec(), b"index:2".to_vec()]);

        // reverse traversal sees the same keys back to front
        let reversed = keys_of(
            eng.scan((Bound::Included(b"row:".to_vec()), Bound::Unbounded))
                .rev(),
        )?;
        assert_eq!(
            reversed,
            vec![b"table:a".to_vec(), b"row:2".to_vec(), b"row:1".to_vec()]
        );
        Ok(())
    }

    fn test_prefix_scan(mut eng: impl Engine) -> Result<()> {
        eng.set(b"row:a".to_vec(), vec![1])?;
        eng.set(b"rox:a".to_vec(), vec![2])?;
        eng.set(b"row:b".to_vec(), vec![3])?;
        eng.set(b"r".to_vec(), vec![4])?;

        let keys = keys_of(eng.scan_prefix(b"row:".to_vec()))?;
        assert_eq!(keys, vec![b"row:a".to_vec(), b"row:b".to_vec()]);

        // a prefix of all 0xff bytes cannot be incremented
        eng.set(vec![0xff, 0xff, 0x01], vec![5])?;
        eng.set(vec![0xff, 0xff, 0xff], vec![6])?;
        let high = eng
            .scan_prefix(vec![0xff, 0xff])
            .collect::<Result<Vec<_>>>()?;
        assert_eq!(high.len(), 2);
        Ok(())
    }

    #[test]
    fn test_memory() -> Result<()> {
        test_point_ops(MemoryEngine::new())?;
        test_range_scan(MemoryEngine::new())?;
        test_prefix_scan(MemoryEngine::new())?;
        Ok(())
    }

    #[test]
    fn test_disk() -> Result<()> {
        let dir = tempfile::tempdir()?;
        test_point_ops(DiskEngine::new(dir.path().join("point.log"))?)?;
        test_range_scan(DiskEngine::new(dir.path().join("scan.log"))?)?;
        test_prefix_scan(DiskEngine::new(dir.path().join("prefix.log"))?)?;
        Ok(())
    }
}
