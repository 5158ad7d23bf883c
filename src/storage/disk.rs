use std::collections::{BTreeMap, btree_map};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use crate::{
    error::Result,
    storage::engine::{Engine, EngineIterator},
};

/// Maps each live key to the position and length of its current value
/// in the log file.
type KeyDir = BTreeMap<Vec<u8>, (u64, u32)>;

const LOG_HEADER_SIZE: u32 = 8;

/// Disk storage engine backed by a single append-only log file.
///
/// Every set/delete appends an entry; an in-memory keydir, rebuilt by
/// scanning the log on startup, points at the latest value for each key.
/// Old entries stay in the file until compact() rewrites it.
///
/// Entry layout: key len (u32 BE) | value len (u32 BE) | key | value.
/// A value length of u32::MAX marks a tombstone and carries no value bytes.
pub struct DiskEngine {
    keydir: KeyDir,
    log: Log,
}

impl DiskEngine {
    pub fn new(path: PathBuf) -> Result<Self> {
        let mut log = Log::new(path)?;
        let keydir = log.build_keydir()?;
        Ok(Self { keydir, log })
    }

    /// Opens the engine and compacts the log right away
    pub fn new_compact(path: PathBuf) -> Result<Self> {
        let mut eng = Self::new(path)?;
        eng.compact()?;
        Ok(eng)
    }

    /// Rewrites only the live entries into a fresh log and swaps it in,
    /// dropping overwritten values and tombstones
    pub fn compact(&mut self) -> Result<()> {
        let mut new_path = self.log.path.clone();
        new_path.set_extension("compact");
        let mut new_log = Log::new(new_path)?;
        let mut new_keydir = KeyDir::new();

        for (key, (offset, value_size)) in self.keydir.iter() {
            let value = self.log.read_value(*offset, *value_size)?;
            let (new_offset, size) = new_log.write_entry(key, Some(&value))?;
            new_keydir.insert(
                key.clone(),
                (new_offset + size as u64 - *value_size as u64, *value_size),
            );
        }
        new_log.file.sync_all()?;

        // the open handle keeps following the renamed file
        std::fs::rename(&new_log.path, &self.log.path)?;
        new_log.path = self.log.path.clone();
        self.keydir = new_keydir;
        self.log = new_log;
        Ok(())
    }
}

impl Engine for DiskEngine {
    type EngineIterator<'a> = DiskEngineIterator<'a>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let (offset, size) = self.log.write_entry(&key, Some(&value))?;
        let value_size = value.len() as u32;
        self.keydir
            .insert(key, (offset + size as u64 - value_size as u64, value_size));
        Ok(())
    }

    fn get(&mut self, key: Vec<u8>) -> Result<Option<Vec<u8>>> {
        match self.keydir.get(&key) {
            Some((offset, value_size)) => {
                let value = self.log.read_value(*offset, *value_size)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.log.write_entry(&key, None)?;
        self.keydir.remove(&key);
        Ok(())
    }

    fn scan(&mut self, range: impl std::ops::RangeBounds<Vec<u8>>) -> Self::EngineIterator<'_> {
        let DiskEngine { keydir, log } = self;
        DiskEngineIterator {
            inner: keydir.range(range),
            log,
        }
    }

    fn flush(&mut self) -> Result<()> {
        Ok(self.log.file.sync_all()?)
    }
}

/// Disk storage engine iterator; walks the keydir in key order and reads
/// each value from the log
pub struct DiskEngineIterator<'a> {
    inner: btree_map::Range<'a, Vec<u8>, (u64, u32)>,
    log: &'a mut Log,
}

impl<'a> DiskEngineIterator<'a> {
    fn map(&mut self, item: (&Vec<u8>, &(u64, u32))) -> <Self as Iterator>::Item {
        let (key, (offset, value_size)) = item;
        let value = self.log.read_value(*offset, *value_size)?;
        Ok((key.clone(), value))
    }
}

impl<'a> EngineIterator for DiskEngineIterator<'a> {}

impl<'a> Iterator for DiskEngineIterator<'a> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next()?;
        Some(self.map(item))
    }
}

impl<'a> DoubleEndedIterator for DiskEngineIterator<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let item = self.inner.next_back()?;
        Some(self.map(item))
    }
}

struct Log {
    path: PathBuf,
    file: File,
}

impl Log {
    fn new(path: PathBuf) -> Result<Self> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)?;
        Ok(Self { path, file })
    }

    /// Scans the whole log and rebuilds the keydir. Later entries win;
    /// tombstones remove earlier sets. A truncated tail is an error, the
    /// file is not silently repaired.
    fn build_keydir(&mut self) -> Result<KeyDir> {
        let mut keydir = KeyDir::new();
        let file_size = self.file.metadata()?.len();
        let mut reader = BufReader::new(&self.file);
        let mut offset = 0;

        while offset < file_size {
            let (key, value_size) = Self::read_entry(&mut reader, offset)?;
            let key_size = key.len() as u64;
            match value_size {
                Some(value_size) => {
                    keydir.insert(
                        key,
                        (offset + LOG_HEADER_SIZE as u64 + key_size, value_size),
                    );
                    offset += LOG_HEADER_SIZE as u64 + key_size + value_size as u64;
                }
                None => {
                    keydir.remove(&key);
                    offset += LOG_HEADER_SIZE as u64 + key_size;
                }
            }
        }
        Ok(keydir)
    }

    fn read_entry(reader: &mut BufReader<&File>, offset: u64) -> Result<(Vec<u8>, Option<u32>)> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; 4];

        reader.read_exact(&mut len_buf)?;
        let key_size = u32::from_be_bytes(len_buf);
        reader.read_exact(&mut len_buf)?;
        let value_size = u32::from_be_bytes(len_buf);

        let mut key = vec![0; key_size as usize];
        reader.read_exact(&mut key)?;

        if value_size == u32::MAX {
            return Ok((key, None));
        }
        // only the value location is needed here, skip over the bytes
        reader.seek_relative(value_size as i64)?;
        Ok((key, Some(value_size)))
    }

    fn write_entry(&mut self, key: &[u8], value: Option<&[u8]>) -> Result<(u64, u32)> {
        let offset = self.file.seek(SeekFrom::End(0))?;
        let key_size = key.len() as u32;
        let value_size = value.map_or(0, |v| v.len() as u32);
        let total_size = LOG_HEADER_SIZE + key_size + value_size;

        let mut writer = BufWriter::with_capacity(total_size as usize, &self.file);
        writer.write_all(&key_size.to_be_bytes())?;
        writer.write_all(&value.map_or(u32::MAX, |v| v.len() as u32).to_be_bytes())?;
        writer.write_all(key)?;
        if let Some(value) = value {
            writer.write_all(value)?;
        }
        writer.flush()?;

        Ok((offset, total_size))
    }

    fn read_value(&mut self, offset: u64, value_size: u32) -> Result<Vec<u8>> {
        self.file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0; value_size as usize];
        self.file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::DiskEngine;
    use crate::{error::Result, storage::engine::Engine};

    #[test]
    fn test_disk_engine_reopen() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("lotdb/kv.log");
        {
            let mut eng = DiskEngine::new(path.clone())?;
            eng.set(b"key1".to_vec(), b"value1".to_vec())?;
            eng.set(b"key2".to_vec(), b"value2".to_vec())?;
            eng.set(b"key2".to_vec(), b"value2b".to_vec())?;
            eng.delete(b"key1".to_vec())?;
            eng.flush()?;
        }

        // the keydir rebuilt from the log sees the latest state
        let mut eng = DiskEngine::new(path)?;
        assert_eq!(eng.get(b"key1".to_vec())?, None);
        assert_eq!(eng.get(b"key2".to_vec())?, Some(b"value2b".to_vec()));
        Ok(())
    }

    #[test]
    fn test_disk_engine_compact() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("kv.log");

        let mut eng = DiskEngine::new(path.clone())?;
        for i in 0..10 {
            eng.set(b"overwritten".to_vec(), vec![i])?;
        }
        eng.set(b"keep".to_vec(), b"v".to_vec())?;
        eng.delete(b"overwritten".to_vec())?;

        let size_before = std::fs::metadata(&path)?.len();
        eng.compact()?;
        let size_after = std::fs::metadata(&path)?.len();
        assert!(size_after < size_before);
        assert_eq!(eng.get(b"keep".to_vec())?, Some(b"v".to_vec()));
        assert_eq!(eng.get(b"overwritten".to_vec())?, None);

        // writes after compaction land in the swapped-in file
        eng.set(b"later".to_vec(), b"w".to_vec())?;
        drop(eng);

        let mut eng = DiskEngine::new(path)?;
        assert_eq!(eng.get(b"keep".to_vec())?, Some(b"v".to_vec()));
        assert_eq!(eng.get(b"later".to_vec())?, Some(b"w".to_vec()));
        assert_eq!(eng.get(b"overwritten".to_vec())?, None);
        Ok(())
    }

    #[test]
    fn test_disk_engine_scan_reads_values() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut eng = DiskEngine::new(dir.path().join("kv.log"))?;
        eng.set(b"a".to_vec(), b"1".to_vec())?;
        eng.set(b"b".to_vec(), b"2".to_vec())?;
        eng.set(b"c".to_vec(), b"3".to_vec())?;
        eng.delete(b"b".to_vec())?;

        let entries = eng.scan(..).collect::<Result<Vec<_>>>()?;
        assert_eq!(
            entries,
            vec![
                (b"a".to_vec(), b"1".to_vec()),
                (b"c".to_vec(), b"3".to_vec()),
            ]
        );
        Ok(())
    }
}
