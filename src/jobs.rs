//! 翻译任务与任务队列
//!
//! 每个任务的状态机为 `Dispatched -> Running -> {Succeeded, Failed}`，
//! 终态之后不再变化。队列基于 tokio mpsc，入队不会阻塞请求方。

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::error::{NoteError, NoteResult};
use crate::model::NoteId;

/// 任务标识符，单调递增
pub type JobId = u64;

/// 默认队列容量
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Dispatched,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    fn can_transition_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Dispatched, JobState::Running)
                | (JobState::Running, JobState::Succeeded)
                | (JobState::Running, JobState::Failed)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Dispatched => "dispatched",
            JobState::Running => "running",
            JobState::Succeeded => "succeeded",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// 一次翻译请求
#[derive(Debug, Clone)]
pub struct TranslationJob {
    pub id: JobId,
    pub note_id: NoteId,
    pub target_language: String,
    pub dispatched_at: DateTime<Utc>,
    state: JobState,
    attempts: u32,
    failure: Option<String>,
}

impl TranslationJob {
    pub fn new(id: JobId, note_id: NoteId, target_language: impl Into<String>) -> Self {
        Self {
            id,
            note_id,
            target_language: target_language.into(),
            dispatched_at: Utc::now(),
            state: JobState::Dispatched,
            attempts: 0,
            failure: None,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    /// 已调用外部翻译函数的次数
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    fn transition(&mut self, next: JobState) -> NoteResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(NoteError::Internal(format!(
                "任务 {} 非法状态转换: {} -> {}",
                self.id, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// `Dispatched -> Running`
    pub fn start(&mut self) -> NoteResult<()> {
        self.transition(JobState::Running)
    }

    /// 记录一次翻译尝试，只允许在 `Running` 状态下调用
    pub fn begin_attempt(&mut self) -> NoteResult<u32> {
        if self.state != JobState::Running {
            return Err(NoteError::Internal(format!(
                "任务 {} 不在运行状态: {}",
                self.id, self.state
            )));
        }
        self.attempts += 1;
        Ok(self.attempts)
    }

    /// `Running -> Succeeded`
    pub fn succeed(&mut self) -> NoteResult<()> {
        self.transition(JobState::Succeeded)
    }

    /// `Running -> Failed`，保留失败原因
    pub fn fail(&mut self, reason: impl Into<String>) -> NoteResult<()> {
        self.transition(JobState::Failed)?;
        self.failure = Some(reason.into());
        Ok(())
    }
}

/// 任务队列接口
///
/// 入队只负责登记并交给异步执行方，不等待任务完成。
pub trait JobQueue: Send + Sync {
    fn enqueue(&self, note_id: NoteId, target_language: &str) -> NoteResult<JobId>;

    /// 笔记已删除，丢弃为它保存的派发记录
    fn forget(&self, _note_id: NoteId) {}
}

/// 每条笔记最近一次派发的任务
#[derive(Debug, Default)]
pub struct DispatchLedger {
    latest: DashMap<NoteId, JobId>,
}

impl DispatchLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登记派发，只保留最大的任务号
    pub fn record(&self, note_id: NoteId, job_id: JobId) {
        self.latest
            .entry(note_id)
            .and_modify(|current| {
                if job_id > *current {
                    *current = job_id;
                }
            })
            .or_insert(job_id);
    }

    pub fn latest(&self, note_id: NoteId) -> Option<JobId> {
        self.latest.get(&note_id).map(|entry| *entry.value())
    }

    /// 仅当 `job_id` 仍是最近派发的任务时执行 `commit`，否则返回最近的任务号
    ///
    /// `commit` 执行期间持有该笔记所在分片的读锁，并发的 `record` 会等待
    /// 它完成，因此检查与写入之间不会插入新的派发。未登记的笔记直接执行。
    /// `commit` 内不能再访问本记录。
    pub fn commit_if_latest<R>(
        &self,
        note_id: NoteId,
        job_id: JobId,
        commit: impl FnOnce() -> R,
    ) -> Result<R, JobId> {
        let guard = self.latest.get(&note_id);
        match guard.as_ref().map(|entry| *entry.value()) {
            Some(latest) if latest != job_id => Err(latest),
            _ => Ok(commit()),
        }
    }

    pub fn forget(&self, note_id: NoteId) {
        self.latest.remove(&note_id);
    }
}

/// 任务接收端，由工作池消费
pub struct JobReceiver {
    receiver: mpsc::Receiver<TranslationJob>,
}

impl JobReceiver {
    pub async fn recv(&mut self) -> Option<TranslationJob> {
        self.receiver.recv().await
    }

    /// 关闭接收端，之后的入队都会失败
    pub fn close(&mut self) {
        self.receiver.close();
    }
}

/// 基于有界 mpsc 通道的任务队列
#[derive(Clone)]
pub struct ChannelJobQueue {
    sender: mpsc::Sender<TranslationJob>,
    next_id: Arc<AtomicU64>,
    ledger: Arc<DispatchLedger>,
}

impl ChannelJobQueue {
    /// 创建队列及其接收端
    pub fn new(capacity: usize, ledger: Arc<DispatchLedger>) -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            next_id: Arc::new(AtomicU64::new(1)),
            ledger,
        };
        (queue, JobReceiver { receiver })
    }
}

impl JobQueue for ChannelJobQueue {
    fn enqueue(&self, note_id: NoteId, target_language: &str) -> NoteResult<JobId> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = TranslationJob::new(id, note_id, target_language);

        // 先登记再发送，工作者收到任务时总能看到它
        self.ledger.record(note_id, id);
        match self.sender.try_send(job) {
            Ok(()) => {
                tracing::debug!(
                    "翻译任务已入队: job {} note {} -> {}",
                    id,
                    note_id,
                    target_language
                );
                Ok(id)
            }
            Err(TrySendError::Full(_)) => Err(NoteError::QueueUnavailable(
                "翻译任务队列已满".to_string(),
            )),
            Err(TrySendError::Closed(_)) => Err(NoteError::QueueUnavailable(
                "翻译任务队列已关闭".to_string(),
            )),
        }
    }

    fn forget(&self, note_id: NoteId) {
        self.ledger.forget(note_id);
    }
}
