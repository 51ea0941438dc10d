//! Sled-based content-addressed artifact cache
//!
//! 键布局：
//! - `artifact:{hash}` → bincode 编码的产物条目
//! - `position:{book}:{chapter}:{index:08}:{params}` → hash
//!
//! 一个产物只有一次 `insert`，读者要么看到完整条目，要么看不到

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sled::Db;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{ArtifactCachePort, CacheError, CacheStats};
use crate::domain::speech::{Artifact, ParagraphPosition, SynthesisParams, WordTiming};

const ARTIFACT_PREFIX: &str = "artifact:";
const POSITION_PREFIX: &str = "position:";

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/cache.sled".to_string(),
        }
    }
}

/// 内部缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InternalArtifactEntry {
    fingerprint: String,
    audio: Vec<u8>,
    word_timings: Vec<WordTiming>,
    content_type: String,
    created_at: i64,
}

impl InternalArtifactEntry {
    fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            fingerprint: artifact.fingerprint().to_string(),
            audio: artifact.audio().to_vec(),
            word_timings: artifact.word_timings().to_vec(),
            content_type: artifact.content_type().to_string(),
            created_at: artifact.created_at().timestamp_millis(),
        }
    }

    fn into_artifact(self) -> Artifact {
        let created_at = Utc
            .timestamp_millis_opt(self.created_at)
            .single()
            .unwrap_or_else(Utc::now);
        Artifact::restore(
            self.fingerprint,
            self.audio,
            self.word_timings,
            self.content_type,
            created_at,
        )
    }
}

fn artifact_key(hash: &str) -> String {
    format!("{}{}", ARTIFACT_PREFIX, hash)
}

fn chapter_prefix(book_id: &str, chapter_ref: &str) -> String {
    format!("{}{}:{}:", POSITION_PREFIX, book_id, chapter_ref)
}

fn position_key(position: &ParagraphPosition, params: &SynthesisParams) -> String {
    format!(
        "{}{:08}:{}",
        chapter_prefix(&position.book_id, &position.chapter_ref),
        position.paragraph_index,
        params.key()
    )
}

/// Sled 产物缓存
pub struct SledArtifactCache {
    db: Db,
    current_size: AtomicU64,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledArtifactCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path).map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        let current_size = Self::calculate_total_size(&db)?;

        tracing::info!(
            db_path = %config.db_path,
            current_size = current_size,
            "SledArtifactCache initialized"
        );

        Ok(Self {
            db,
            current_size: AtomicU64::new(current_size),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CacheError> {
        Self::new(&SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
        })
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn calculate_total_size(db: &Db) -> Result<u64, CacheError> {
        let mut total = 0u64;
        for item in db.scan_prefix(ARTIFACT_PREFIX) {
            let (_, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            if let Ok(entry) = bincode::deserialize::<InternalArtifactEntry>(&value) {
                total += entry.audio.len() as u64;
            }
        }
        Ok(total)
    }

    /// 刷新数据库
    pub fn flush(&self) -> Result<(), CacheError> {
        self.db
            .flush()
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    /// 删除损坏条目
    fn drop_corrupt(&self, key: &str, error: &bincode::Error) {
        tracing::warn!(key = %key, error = %error, "Corrupt artifact entry, dropping");
        let _ = self.db.remove(key);
    }
}

#[async_trait]
impl ArtifactCachePort for SledArtifactCache {
    async fn get(&self, hash: &str) -> Result<Option<Artifact>, CacheError> {
        let key = artifact_key(hash);

        match self.db.get(&key) {
            Ok(Some(data)) => match bincode::deserialize::<InternalArtifactEntry>(&data) {
                Ok(entry) => {
                    self.hit_count.fetch_add(1, Ordering::Relaxed);
                    Ok(Some(entry.into_artifact()))
                }
                Err(e) => {
                    self.drop_corrupt(&key, &e);
                    self.miss_count.fetch_add(1, Ordering::Relaxed);
                    Ok(None)
                }
            },
            Ok(None) => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            Err(e) => Err(CacheError::DatabaseError(e.to_string())),
        }
    }

    async fn put(&self, artifact: &Artifact) -> Result<(), CacheError> {
        let entry = InternalArtifactEntry::from_artifact(artifact);
        let size = entry.audio.len() as u64;
        let entry_bytes =
            bincode::serialize(&entry).map_err(|e| CacheError::SerializationError(e.to_string()))?;

        let previous = self
            .db
            .insert(artifact_key(artifact.fingerprint()), entry_bytes)
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

        // 同一指纹重复写入不重复计数
        if previous.is_none() {
            self.current_size.fetch_add(size, Ordering::Relaxed);
        }

        tracing::debug!(
            fingerprint = %artifact.fingerprint(),
            size_bytes = size,
            "Artifact cached"
        );

        Ok(())
    }

    async fn contains(&self, hash: &str) -> Result<bool, CacheError> {
        self.db
            .contains_key(artifact_key(hash))
            .map_err(|e| CacheError::DatabaseError(e.to_string()))
    }

    async fn index_position(
        &self,
        position: &ParagraphPosition,
        params: &SynthesisParams,
        hash: &str,
    ) -> Result<(), CacheError> {
        self.db
            .insert(position_key(position, params), hash.as_bytes())
            .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
        Ok(())
    }

    async fn list_positions(
        &self,
        book_id: &str,
        chapter_ref: &str,
        params: &SynthesisParams,
    ) -> Result<Vec<(u32, String)>, CacheError> {
        let prefix = chapter_prefix(book_id, chapter_ref);
        let suffix = format!(":{}", params.key());
        let mut positions = Vec::new();

        for item in self.db.scan_prefix(&prefix) {
            let (key, value) = item.map_err(|e| CacheError::DatabaseError(e.to_string()))?;
            let key = String::from_utf8(key.to_vec())
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;
            let Some(rest) = key[prefix.len()..].strip_suffix(&suffix) else {
                continue;
            };
            let Ok(index) = rest.parse::<u32>() else {
                continue;
            };
            let hash = String::from_utf8(value.to_vec())
                .map_err(|e| CacheError::SerializationError(e.to_string()))?;
            positions.push((index, hash));
        }

        Ok(positions)
    }

    async fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.db.scan_prefix(ARTIFACT_PREFIX).count(),
            total_size_bytes: self.current_size.load(Ordering::Relaxed),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0usize;

        for prefix in [ARTIFACT_PREFIX, POSITION_PREFIX] {
            let keys: Vec<_> = self
                .db
                .scan_prefix(prefix)
                .keys()
                .collect::<Result<_, _>>()
                .map_err(|e| CacheError::DatabaseError(e.to_string()))?;

            for key in keys {
                self.db
                    .remove(&key)
                    .map_err(|e| CacheError::DatabaseError(e.to_string()))?;
                if prefix == ARTIFACT_PREFIX {
                    removed += 1;
                }
            }
        }

        self.current_size.store(0, Ordering::Relaxed);
        tracing::info!(removed = removed, "Artifact cache cleared");

        Ok(removed)
    }
}
