//! Content-addressed asset store: one canonical file per distinct image.
//!
//! Identity is the SHA-256 of the raw bytes — never the filename, never the
//! originating document. Two snapshots saving the same logo under different
//! names collapse to a single `<hash>.<ext>` file in the shared asset
//! directory, and every Markdown document links to that one copy.
//!
//! ## Concurrency discipline
//!
//! The hash→record map sits behind a single `tokio::sync::Mutex`, and the
//! first-insertion disk copy happens **while holding the lock**. That is the
//! whole exactly-once argument: two workers racing on the same new hash
//! serialise on the mutex, the loser finds the record already present, and
//! the copy runs once. A coarse lock is plenty here — the workload is
//! dominated by LLM network latency, not store contention.
//!
//! The store is append-only for the lifetime of a run; records are never
//! evicted and `ref_count` is informational.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// One deduplicated asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    /// SHA-256 of the asset bytes, lower-case hex. Unique across the store.
    pub content_hash: String,
    /// Hash-derived file name in the shared asset directory.
    pub canonical_filename: String,
    /// Number of distinct documents referencing this content.
    pub ref_count: u64,
}

/// Process-wide, run-scoped repository of binary assets.
pub struct AssetStore {
    asset_dir: PathBuf,
    records: Mutex<HashMap<String, AssetRecord>>,
}

impl AssetStore {
    /// Open a store rooted at `asset_dir`, creating the directory.
    pub fn open(asset_dir: impl Into<PathBuf>) -> io::Result<AssetStore> {
        let asset_dir = asset_dir.into();
        std::fs::create_dir_all(&asset_dir)?;
        Ok(AssetStore {
            asset_dir,
            records: Mutex::new(HashMap::new()),
        })
    }

    /// The directory canonical files are copied into.
    pub fn asset_dir(&self) -> &Path {
        &self.asset_dir
    }

    /// Insert-or-get by content. The bytes are copied to disk exactly once
    /// per distinct hash, no matter how many workers race on it.
    ///
    /// `original_ext` is the source file's extension (if any); when absent
    /// the extension is inferred from the bytes' magic numbers, falling back
    /// to `bin`. Does not touch `ref_count` — see [`AssetStore::add_document_ref`].
    pub async fn intern(&self, bytes: &[u8], original_ext: Option<&str>) -> io::Result<AssetRecord> {
        let hash = content_hash(bytes);

        let mut records = self.records.lock().await;
        if let Some(existing) = records.get(&hash) {
            return Ok(existing.clone());
        }

        let ext = original_ext
            .map(|e| e.to_ascii_lowercase())
            .or_else(|| infer_extension(bytes))
            .unwrap_or_else(|| "bin".to_string());
        let canonical_filename = format!("{hash}.{ext}");
        let target = self.asset_dir.join(&canonical_filename);

        // Copy under the lock: write to a sibling temp path, then rename, so
        // a crash never leaves a truncated asset at the canonical name.
        let tmp = self.asset_dir.join(format!("{canonical_filename}.tmp"));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &target).await?;
        debug!("stored asset {} ({} bytes)", canonical_filename, bytes.len());

        let record = AssetRecord {
            content_hash: hash.clone(),
            canonical_filename,
            ref_count: 0,
        };
        records.insert(hash, record.clone());
        Ok(record)
    }

    /// Record that one more document references `hash`.
    ///
    /// Callers deduplicate per document (a document referencing the same
    /// content through three different raw paths counts once).
    pub async fn add_document_ref(&self, hash: &str) {
        if let Some(record) = self.records.lock().await.get_mut(hash) {
            record.ref_count += 1;
        }
    }

    /// Number of distinct assets interned so far.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }

    /// Snapshot of all records (for the end-of-run summary).
    pub async fn records(&self) -> Vec<AssetRecord> {
        self.records.lock().await.values().cloned().collect()
    }
}

/// Lower-case hex SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Guess a file extension from magic bytes.
fn infer_extension(bytes: &[u8]) -> Option<String> {
    image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    #[tokio::test]
    async fn identical_bytes_intern_once() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let a = store.intern(b"same-bytes", Some("png")).await.unwrap();
        let b = store.intern(b"same-bytes", Some("jpg")).await.unwrap();

        // Second call reuses the first record — original filename (and even
        // its extension) is irrelevant once the content is known.
        assert_eq!(a, b);
        assert_eq!(store.len().await, 1);

        let files: Vec<_> = std::fs::read_dir(store.asset_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn distinct_bytes_get_distinct_records() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let a = store.intern(b"aaa", Some("png")).await.unwrap();
        let b = store.intern(b"bbb", Some("png")).await.unwrap();
        assert_ne!(a.content_hash, b.content_hash);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn canonical_filename_is_hash_dot_ext() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let rec = store.intern(b"payload", Some("PNG")).await.unwrap();
        assert_eq!(rec.canonical_filename, format!("{}.png", rec.content_hash));
        assert!(store.asset_dir().join(&rec.canonical_filename).is_file());
    }

    #[tokio::test]
    async fn extension_inferred_from_magic_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let rec = store.intern(PNG_MAGIC, None).await.unwrap();
        assert!(rec.canonical_filename.ends_with(".png"), "{rec:?}");
    }

    #[tokio::test]
    async fn unknown_bytes_fall_back_to_bin() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let rec = store.intern(b"not an image at all", None).await.unwrap();
        assert!(rec.canonical_filename.ends_with(".bin"));
    }

    #[tokio::test]
    async fn ref_count_tracks_documents() {
        let tmp = TempDir::new().unwrap();
        let store = AssetStore::open(tmp.path().join("assets")).unwrap();

        let rec = store.intern(b"shared", Some("png")).await.unwrap();
        store.add_document_ref(&rec.content_hash).await;
        store.add_document_ref(&rec.content_hash).await;

        let records = store.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ref_count, 2);
    }

    #[tokio::test]
    async fn racing_workers_store_one_copy() {
        let tmp = TempDir::new().unwrap();
        let store = std::sync::Arc::new(AssetStore::open(tmp.path().join("assets")).unwrap());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.intern(b"hot image", Some("png")).await.unwrap()
            }));
        }
        let mut names = std::collections::HashSet::new();
        for h in handles {
            names.insert(h.await.unwrap().canonical_filename);
        }

        assert_eq!(names.len(), 1);
        assert_eq!(store.len().await, 1);
        let files = std::fs::read_dir(store.asset_dir()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn content_hash_is_stable_hex() {
        let h = content_hash(b"abc");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
