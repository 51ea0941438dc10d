//! Job Context - Aggregate Root

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ChapterProgress, JobError, JobResult, JobStatus, OutputMode, TocEntry};
use crate::domain::speech::SynthesisParams;

/// Job 聚合根
///
/// 不变量:
/// - 章节列表在创建时确定，顺序即目录顺序
/// - 进度单调不减
/// - 只有 Job Orchestrator 的 worker 推进状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub book_id: String,
    pub book_title: String,
    pub params: SynthesisParams,
    pub mode: OutputMode,
    pub status: JobStatus,
    pub progress: u8,
    pub progress_text: String,
    pub chapters: Vec<ChapterProgress>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
}

impl Job {
    /// 根据目录创建新任务
    pub fn new(
        book_id: impl Into<String>,
        book_title: impl Into<String>,
        params: SynthesisParams,
        mode: OutputMode,
        toc: Vec<TocEntry>,
    ) -> Result<Self, JobError> {
        if toc.is_empty() {
            return Err(JobError::EmptyTableOfContents);
        }

        let chapters = toc
            .into_iter()
            .enumerate()
            .map(|(order, entry)| ChapterProgress {
                order: order as u32,
                chapter_ref: entry.chapter_ref,
                title: entry.title,
                completed: false,
            })
            .collect();

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            book_id: book_id.into(),
            book_title: book_title.into(),
            params,
            mode,
            status: JobStatus::Pending,
            progress: 0,
            progress_text: "Waiting to start".to_string(),
            chapters,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        })
    }

    pub fn total_chapters(&self) -> usize {
        self.chapters.len()
    }

    pub fn completed_chapters(&self) -> usize {
        self.chapters.iter().filter(|c| c.completed).count()
    }

    /// 第一个未完成章节的下标（从 0 开始）
    pub fn first_incomplete_chapter(&self) -> Option<usize> {
        self.chapters.iter().position(|c| !c.completed)
    }

    /// 续传起点（从 1 开始），没有已完成章节时为 None
    pub fn resume_from_chapter(&self) -> Option<u32> {
        if self.completed_chapters() == 0 {
            return None;
        }
        self.first_incomplete_chapter().map(|i| i as u32 + 1)
    }

    pub fn is_incomplete(&self) -> bool {
        self.status != JobStatus::Completed
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, JobStatus::Pending | JobStatus::Running)
    }

    /// 是否属于同一个 (book, voice, rate, pitch, mode) 元组
    pub fn matches(&self, book_id: &str, params: &SynthesisParams, mode: OutputMode) -> bool {
        self.book_id == book_id && self.params.key() == params.key() && self.mode == mode
    }

    /// completedChapters / totalChapters 的百分比
    pub fn progress_percent(&self) -> u8 {
        let total = self.total_chapters();
        if total == 0 {
            return 0;
        }
        ((self.completed_chapters() * 100) / total) as u8
    }

    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition(JobStatus::Running, &[JobStatus::Pending])?;
        if self.started_at.is_none() {
            self.started_at = Some(Utc::now());
        }
        self.progress_text = match self.resume_from_chapter() {
            Some(from) => format!(
                "Resuming from chapter {}/{}",
                from,
                self.total_chapters()
            ),
            None => format!("Rendering {} chapters", self.total_chapters()),
        };
        Ok(())
    }

    pub fn complete_chapter(&mut self, order: u32) -> Result<(), JobError> {
        if self.status != JobStatus::Running {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to: JobStatus::Running,
            });
        }
        let chapter = self
            .chapters
            .iter_mut()
            .find(|c| c.order == order)
            .ok_or(JobError::UnknownChapter(order))?;
        chapter.completed = true;

        self.progress = self.progress.max(self.progress_percent());
        self.progress_text = format!(
            "Completed {}/{} chapters",
            self.completed_chapters(),
            self.total_chapters()
        );
        Ok(())
    }

    pub fn complete(&mut self, result: JobResult) -> Result<(), JobError> {
        self.transition(JobStatus::Completed, &[JobStatus::Running])?;
        self.progress = 100;
        self.progress_text = "Completed".to_string();
        self.result = Some(result);
        self.error = None;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    pub fn fail(&mut self, error: impl Into<String>) -> Result<(), JobError> {
        self.transition(JobStatus::Failed, &[JobStatus::Pending, JobStatus::Running])?;
        self.error = Some(error.into());
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// 失败或中断的任务重新进入 pending
    pub fn reset_for_resume(&mut self) -> Result<(), JobError> {
        self.transition(
            JobStatus::Pending,
            &[JobStatus::Pending, JobStatus::Running, JobStatus::Failed],
        )?;
        self.error = None;
        self.completed_at = None;
        self.progress_text = match self.resume_from_chapter() {
            Some(from) => format!("Waiting to resume from chapter {}", from),
            None => "Waiting to start".to_string(),
        };
        Ok(())
    }

    fn transition(&mut self, to: JobStatus, allowed_from: &[JobStatus]) -> Result<(), JobError> {
        if !allowed_from.contains(&self.status) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }
}
