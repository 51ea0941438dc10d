//! Render Storage - 整书渲染的文件系统存储
//!
//! - 章节中间文件: `{work_dir}/{job_id}/{order:04}.part`
//! - 最终产物: `{output_dir}/{filename}`
//!
//! 所有写入先落到 `.tmp` 文件再 rename，读者不会看到写了一半的文件

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::application::ports::{RenderStoreError, RenderStorePort};

/// 输出文件名只保留字母数字、空格、`-` 和 `_`
pub fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == ' ' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .take(80)
        .collect();
    let cleaned = cleaned.trim().trim_matches('_').to_string();
    if cleaned.is_empty() {
        "untitled".to_string()
    } else {
        cleaned
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// 渲染文件存储
pub struct RenderStorage {
    work_dir: PathBuf,
    output_dir: PathBuf,
}

impl RenderStorage {
    /// 创建存储并确保目录存在
    pub async fn new(
        work_dir: impl AsRef<Path>,
        output_dir: impl AsRef<Path>,
    ) -> Result<Self, RenderStoreError> {
        let work_dir = work_dir.as_ref().to_path_buf();
        let output_dir = output_dir.as_ref().to_path_buf();

        fs::create_dir_all(&work_dir).await?;
        fs::create_dir_all(&output_dir).await?;

        Ok(Self { work_dir, output_dir })
    }

    pub fn job_dir(&self, job_id: &str) -> PathBuf {
        self.work_dir.join(job_id)
    }

    pub fn part_path(&self, job_id: &str, order: u32) -> PathBuf {
        self.job_dir(job_id).join(format!("{:04}.part", order))
    }
}

#[async_trait]
impl RenderStorePort for RenderStorage {
    async fn write_part(&self, job_id: &str, order: u32, data: &[u8]) -> Result<(), RenderStoreError> {
        fs::create_dir_all(self.job_dir(job_id)).await?;

        let path = self.part_path(job_id, order);
        let tmp = tmp_path(&path);
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(job_id = %job_id, order = order, size = data.len(), "Chapter part written");
        Ok(())
    }

    async fn read_part(&self, job_id: &str, order: u32) -> Result<Option<Vec<u8>>, RenderStoreError> {
        match fs::read(self.part_path(job_id, order)).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn has_part(&self, job_id: &str, order: u32) -> bool {
        fs::metadata(self.part_path(job_id, order)).await.is_ok()
    }

    async fn remove_parts(&self, job_id: &str) -> Result<(), RenderStoreError> {
        match fs::remove_dir_all(self.job_dir(job_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_merged(
        &self,
        job_id: &str,
        orders: &[u32],
        filename: &str,
    ) -> Result<u64, RenderStoreError> {
        let path = self.output_path(filename);
        let tmp = tmp_path(&path);

        let mut output = fs::File::create(&tmp).await?;
        let mut total = 0u64;
        for &order in orders {
            let mut part = fs::File::open(self.part_path(job_id, order)).await?;
            total += tokio::io::copy(&mut part, &mut output).await?;
        }
        output.flush().await?;
        output.sync_all().await?;
        drop(output);

        fs::rename(&tmp, &path).await?;
        Ok(total)
    }

    async fn write_archive(
        &self,
        job_id: &str,
        entries: Vec<(u32, String)>,
        filename: &str,
    ) -> Result<u64, RenderStoreError> {
        let path = self.output_path(filename);
        let tmp = tmp_path(&path);
        let sources: Vec<(PathBuf, String)> = entries
            .into_iter()
            .map(|(order, name)| (self.part_path(job_id, order), name))
            .collect();

        let archive_tmp = tmp.clone();
        tokio::task::spawn_blocking(move || -> Result<(), RenderStoreError> {
            let file = std::fs::File::create(&archive_tmp)?;
            let mut zip = ZipWriter::new(file);
            // 音频本身已压缩
            let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);

            for (source, name) in sources {
                zip.start_file(name, options)
                    .map_err(|e| RenderStoreError::ArchiveError(e.to_string()))?;
                let mut part = std::fs::File::open(&source)?;
                std::io::copy(&mut part, &mut zip)?;
            }

            let file = zip
                .finish()
                .map_err(|e| RenderStoreError::ArchiveError(e.to_string()))?;
            file.sync_all()?;
            Ok(())
        })
        .await
        .map_err(|e| RenderStoreError::ArchiveError(e.to_string()))??;

        fs::rename(&tmp, &path).await?;
        let size = fs::metadata(&path).await?.len();
        Ok(size)
    }

    async fn write_output(&self, filename: &str, data: &[u8]) -> Result<u64, RenderStoreError> {
        let path = self.output_path(filename);
        let tmp = tmp_path(&path);
        fs::write(&tmp, data).await?;
        fs::rename(&tmp, &path).await?;

        tracing::debug!(filename = %filename, size = data.len(), "Output written");
        Ok(data.len() as u64)
    }

    async fn remove_output(&self, filename: &str) -> Result<(), RenderStoreError> {
        match fs::remove_file(self.output_path(filename)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn output_path(&self, filename: &str) -> PathBuf {
        self.output_dir.join(filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> RenderStorage {
        RenderStorage::new(dir.join("work"), dir.join("output")).await.unwrap()
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("Moby Dick"), "Moby Dick");
        assert_eq!(sanitize_filename("a/b:c"), "a_b_c");
        assert_eq!(sanitize_filename("..."), "untitled");
        assert_eq!(sanitize_filename("三体"), "三体");
    }

    #[tokio::test]
    async fn test_parts_roundtrip_and_cleanup() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage.write_part("job", 0, b"abc").await.unwrap();
        assert!(storage.has_part("job", 0).await);
        assert_eq!(storage.read_part("job", 0).await.unwrap().unwrap(), b"abc");
        assert!(storage.read_part("job", 1).await.unwrap().is_none());

        storage.remove_parts("job").await.unwrap();
        assert!(!storage.has_part("job", 0).await);
        storage.remove_parts("job").await.unwrap();
    }

    #[tokio::test]
    async fn test_merged_preserves_order() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage.write_part("job", 0, b"one;").await.unwrap();
        storage.write_part("job", 1, b"two;").await.unwrap();
        storage.write_part("job", 2, b"three;").await.unwrap();

        let size = storage.write_merged("job", &[0, 1, 2], "out.mp3").await.unwrap();
        let merged = fs::read(storage.output_path("out.mp3")).await.unwrap();
        assert_eq!(merged, b"one;two;three;");
        assert_eq!(size, merged.len() as u64);
        assert!(!tmp_path(&storage.output_path("out.mp3")).exists());
    }

    #[tokio::test]
    async fn test_write_output_replaces_atomically() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        assert_eq!(storage.write_output("chapter.mp3", b"first").await.unwrap(), 5);
        assert_eq!(storage.write_output("chapter.mp3", b"second").await.unwrap(), 6);

        let path = storage.output_path("chapter.mp3");
        assert_eq!(fs::read(&path).await.unwrap(), b"second");
        assert!(!tmp_path(&path).exists());
    }

    #[tokio::test]
    async fn test_archive_entries_in_order() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage.write_part("job", 0, b"one").await.unwrap();
        storage.write_part("job", 1, b"two").await.unwrap();

        storage
            .write_archive(
                "job",
                vec![(0, "001 - A.mp3".to_string()), (1, "002 - B.mp3".to_string())],
                "out.zip",
            )
            .await
            .unwrap();

        let file = std::fs::File::open(storage.output_path("out.zip")).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.by_index(0).unwrap().name(), "001 - A.mp3");
        assert_eq!(archive.by_index(1).unwrap().name(), "002 - B.mp3");
    }
}
