use rocksdb::{DB, IteratorMode, Options, ReadOptions};
use serde::{Serialize, de::DeserializeOwned};
use std::{path::Path, sync::Arc};

const MAX_OPEN_FILES: i32 = 512;

/// Thin RocksDB wrapper with JSON-serialized values. Cloning shares the
/// underlying handle.
#[derive(Clone)]
pub struct KvDb {
    inner: Arc<DB>,
}

impl KvDb {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_level_compaction_dynamic_level_bytes(true);
        opts.set_max_open_files(MAX_OPEN_FILES);
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        let db = DB::open(&opts, path)?;
        Ok(Self {
            inner: Arc::new(db),
        })
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> anyhow::Result<Option<T>> {
        let v = self.inner.get(key.as_bytes())?;
        if let Some(raw) = v {
            let t = serde_json::from_slice::<T>(&raw)?;
            Ok(Some(t))
        } else {
            Ok(None)
        }
    }

    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> anyhow::Result<()> {
        let buf = serde_json::to_vec(value)?;
        self.inner.put(key.as_bytes(), buf)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.delete(key.as_bytes())?;
        Ok(())
    }

    pub fn iter(&self) -> rocksdb::DBIterator<'_> {
        let readopts = ReadOptions::default();
        self.inner.iterator_opt(IteratorMode::Start, readopts)
    }

    /// Decode every value stored under `prefix` (e.g. "placement:").
    pub fn scan_prefix<T: DeserializeOwned>(&self, prefix: &str) -> anyhow::Result<Vec<T>> {
        let mut out = Vec::new();
        for kv in self.inner.prefix_iterator(prefix.as_bytes()) {
            let (k, v) = kv?;
            if !k.starts_with(prefix.as_bytes()) {
                break;
            }
            out.push(serde_json::from_slice::<T>(&v)?);
        }
        Ok(out)
    }
}
