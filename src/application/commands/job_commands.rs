//! Job Commands - 整书渲染任务命令

use crate::domain::job::OutputMode;
use crate::domain::speech::SynthesisParams;

/// 创建任务，同一元组已有未完成任务时续传
#[derive(Debug, Clone)]
pub struct CreateOrResumeJobCommand {
    pub book_id: String,
    pub params: SynthesisParams,
    pub mode: OutputMode,
}

#[derive(Debug, Clone)]
pub struct CreateOrResumeJobResponse {
    pub job_id: String,
    pub resumed: bool,
    /// 从 1 开始的章节序号
    pub resume_from_chapter: Option<u32>,
}

/// 删除任务；运行中的任务在下一个章节边界停止
#[derive(Debug, Clone)]
pub struct DeleteJobCommand {
    pub job_id: String,
}

#[derive(Debug, Clone)]
pub struct DeleteJobResponse {
    pub job_id: String,
    /// 删除时任务仍在队列或运行中
    pub cancelled: bool,
}
