//! 翻译工作池
//!
//! 在请求路径之外消费翻译任务：读取笔记、调用外部翻译函数、
//! 写回译文并使缓存失效。失败只记录日志和统计，不会反馈给请求方。
//!
//! ## 处理流程
//!
//! 1. `Dispatched -> Running`：按 `note_id` 读取笔记，不存在则任务失败
//! 2. 在阻塞线程上调用翻译函数（可选超时、可选指数退避重试）
//! 3. 按提交策略写回 `translated_text`/`translated_language`
//! 4. 无条件删除该笔记的缓存条目，任务进入 `Succeeded`

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::cache::NoteCache;
use crate::error::{NoteError, NoteResult};
use crate::jobs::{DispatchLedger, JobId, JobReceiver, JobState, TranslationJob, DEFAULT_QUEUE_CAPACITY};
use crate::model::{Note, NoteChanges, NoteId, Translation};
use crate::repository::NoteRepository;
use crate::translator::Translator;

/// 并发翻译的笔记写入策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CommitPolicy {
    /// 最后完成的任务覆盖之前的结果
    #[default]
    LastWriteWins,
    /// 只有该笔记最近一次派发的任务才能写入，其余结果丢弃
    ///
    /// 检查与写入在派发记录的锁内完成，写入期间的新派发会等到写入结束后才登记。
    LatestDispatchOnly,
}

impl std::str::FromStr for CommitPolicy {
    type Err = NoteError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(CommitPolicy::LastWriteWins),
            "latest-dispatch-only" | "latest" => Ok(CommitPolicy::LatestDispatchOnly),
            other => Err(NoteError::Config(format!(
                "未知的提交策略 '{}'，可选: last-write-wins, latest-dispatch-only",
                other
            ))),
        }
    }
}

/// 工作池配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 同时执行的任务数
    pub concurrency: usize,
    /// 队列容量，满时拒绝新任务
    pub queue_capacity: usize,
    /// 可重试错误的最大重试次数，0 表示不重试
    pub max_retries: u32,
    /// 重试基础延迟，实际延迟 = base * 2^(attempt - 1)
    pub retry_base_delay_ms: u64,
    /// 单次翻译调用的超时（毫秒），未设置时不限制
    pub translation_timeout_ms: Option<u64>,
    pub commit_policy: CommitPolicy,
    /// 死信列表保留的最大条数
    pub dead_letter_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_retries: 0,
            retry_base_delay_ms: 1000,
            translation_timeout_ms: None,
            commit_policy: CommitPolicy::LastWriteWins,
            dead_letter_capacity: 100,
        }
    }
}

impl WorkerConfig {
    pub fn translation_timeout(&self) -> Option<Duration> {
        self.translation_timeout_ms.map(Duration::from_millis)
    }

    /// 第 `attempt` 次失败后的退避时间
    pub fn retry_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(1u64 << exponent))
    }
}

/// 任务执行结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// 译文已写回，缓存已失效
    Succeeded { translated_text: String },
    /// 任务失败，笔记和缓存均未改动
    Failed { reason: String },
    /// 结果已被更新的任务取代而丢弃
    Superseded { latest: JobId },
}

/// 单个任务的执行报告
#[derive(Debug, Clone)]
pub struct JobReport {
    pub job_id: JobId,
    pub note_id: NoteId,
    pub target_language: String,
    pub state: JobState,
    pub attempts: u32,
    pub outcome: JobOutcome,
}

impl JobReport {
    fn from_job(job: &TranslationJob, outcome: JobOutcome) -> Self {
        Self {
            job_id: job.id,
            note_id: job.note_id,
            target_language: job.target_language.clone(),
            state: job.state(),
            attempts: job.attempts(),
            outcome,
        }
    }
}

/// 重试用尽后进入死信列表的任务
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub job_id: JobId,
    pub note_id: NoteId,
    pub target_language: String,
    pub attempts: u32,
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

/// 有界死信列表，超出容量时丢弃最早的记录
#[derive(Debug)]
pub struct DeadLetterQueue {
    entries: Mutex<VecDeque<DeadLetter>>,
    capacity: usize,
}

impl DeadLetterQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    fn push(&self, letter: DeadLetter) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(letter);
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 最近的死信记录，按时间先后排列
    pub fn snapshot(&self) -> Vec<DeadLetter> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }
}

/// 工作池统计信息（线程安全版本）
#[derive(Debug, Default)]
pub struct WorkerStats {
    pub jobs_started: AtomicUsize,
    pub jobs_succeeded: AtomicUsize,
    pub jobs_failed: AtomicUsize,
    pub discarded_stale: AtomicUsize,
    pub retries: AtomicUsize,
    pub dead_lettered: AtomicUsize,
    pub in_flight: AtomicUsize,
    /// 翻译调用总耗时，以微秒为单位存储
    pub translation_time: AtomicU64,
}

impl WorkerStats {
    fn add_translation_time(&self, duration: Duration) {
        self.translation_time
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> WorkerStatsSnapshot {
        WorkerStatsSnapshot {
            jobs_started: self.jobs_started.load(Ordering::Relaxed),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            discarded_stale: self.discarded_stale.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            dead_lettered: self.dead_lettered.load(Ordering::Relaxed),
            in_flight: self.in_flight.load(Ordering::Relaxed),
            translation_time_ms: self.translation_time.load(Ordering::Relaxed) / 1000,
        }
    }
}

/// 工作池统计数据的不可变快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WorkerStatsSnapshot {
    pub jobs_started: usize,
    pub jobs_succeeded: usize,
    pub jobs_failed: usize,
    pub discarded_stale: usize,
    pub retries: usize,
    pub dead_lettered: usize,
    pub in_flight: usize,
    pub translation_time_ms: u64,
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl<'a> InFlightGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::Relaxed);
        Self(counter)
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// 翻译任务执行者
///
/// 仓库、缓存、翻译函数和派发记录都通过构造参数注入。
pub struct TranslationWorker {
    repository: Arc<dyn NoteRepository>,
    cache: Arc<dyn NoteCache>,
    translator: Arc<dyn Translator>,
    ledger: Arc<DispatchLedger>,
    config: WorkerConfig,
    stats: Arc<WorkerStats>,
    dead_letters: Arc<DeadLetterQueue>,
}

impl TranslationWorker {
    pub fn new(
        repository: Arc<dyn NoteRepository>,
        cache: Arc<dyn NoteCache>,
        translator: Arc<dyn Translator>,
        ledger: Arc<DispatchLedger>,
        config: WorkerConfig,
    ) -> Self {
        let dead_letters = Arc::new(DeadLetterQueue::new(config.dead_letter_capacity));
        Self {
            repository,
            cache,
            translator,
            ledger,
            config,
            stats: Arc::new(WorkerStats::default()),
            dead_letters,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<WorkerStats> {
        Arc::clone(&self.stats)
    }

    pub fn dead_letters(&self) -> Arc<DeadLetterQueue> {
        Arc::clone(&self.dead_letters)
    }

    /// 执行一个任务直到终态
    pub async fn execute(&self, mut job: TranslationJob) -> JobReport {
        let _in_flight = InFlightGuard::enter(&self.stats.in_flight);

        if let Err(e) = job.start() {
            tracing::error!("{}", e);
            return JobReport::from_job(&job, JobOutcome::Failed { reason: e.to_string() });
        }
        self.stats.jobs_started.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            job_id = job.id,
            note_id = job.note_id,
            target_language = %job.target_language,
            "开始执行翻译任务"
        );

        let note = match self.repository.get(job.note_id) {
            Ok(note) => note,
            Err(NoteError::NotFound(_)) => return self.fail(job, "note not found".to_string()),
            Err(e) => return self.fail(job, e.to_string()),
        };

        let translated = match self.translate_with_retry(&mut job, &note).await {
            Ok(text) => text,
            Err(e) => {
                if self.config.max_retries > 0 && e.is_retryable() {
                    self.dead_letter(&job, &e);
                }
                return self.fail(job, e.to_string());
            }
        };

        let note_id = job.note_id;
        let changes = NoteChanges::translated(Translation::new(
            translated.clone(),
            job.target_language.clone(),
        ));
        let write = move || self.repository.update(note_id, changes);
        let written = match self.config.commit_policy {
            CommitPolicy::LastWriteWins => write(),
            CommitPolicy::LatestDispatchOnly => {
                match self.ledger.commit_if_latest(note_id, job.id, write) {
                    Ok(written) => written,
                    Err(latest) => return self.supersede(job, latest),
                }
            }
        };
        match written {
            Ok(_) => {}
            Err(NoteError::NotFound(_)) => {
                return self.fail(job, "note not found".to_string());
            }
            Err(e) => return self.fail(job, e.to_string()),
        }

        // 写入之后无条件失效，即使缓存中原本没有该条目
        self.cache.delete(job.note_id);

        if let Err(e) = job.succeed() {
            tracing::error!("{}", e);
        }
        self.stats.jobs_succeeded.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            job_id = job.id,
            note_id = job.note_id,
            attempts = job.attempts(),
            "成功翻译笔记 {} 为 {}",
            job.note_id,
            job.target_language
        );

        JobReport::from_job(
            &job,
            JobOutcome::Succeeded {
                translated_text: translated,
            },
        )
    }

    async fn translate_with_retry(
        &self,
        job: &mut TranslationJob,
        note: &Note,
    ) -> NoteResult<String> {
        loop {
            let attempt = job.begin_attempt()?;

            match self.translate_once(note, &job.target_language).await {
                Ok(text) => {
                    if attempt > 1 {
                        tracing::info!("任务 {} 在第 {} 次尝试后成功", job.id, attempt);
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt <= self.config.max_retries => {
                    let delay = self.config.retry_delay(attempt);
                    self.stats.retries.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        "任务 {} 第 {} 次翻译失败，{}ms 后重试: {}",
                        job.id,
                        attempt,
                        delay.as_millis(),
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn translate_once(&self, note: &Note, target_language: &str) -> NoteResult<String> {
        let translator = Arc::clone(&self.translator);
        let text = note.original_text.clone();
        let source = note.original_language.clone();
        let target = target_language.to_string();

        let started = Instant::now();
        let handle =
            tokio::task::spawn_blocking(move || translator.translate(&text, &source, &target));

        // 超时只停止等待，已经开始的阻塞调用会自行结束
        let joined = match self.config.translation_timeout() {
            Some(limit) => tokio::time::timeout(limit, handle).await?,
            None => handle.await,
        };
        self.stats.add_translation_time(started.elapsed());

        joined.map_err(|e| NoteError::TranslationFailed(format!("翻译线程异常退出: {}", e)))?
    }

    fn fail(&self, mut job: TranslationJob, reason: String) -> JobReport {
        if let Err(e) = job.fail(reason.clone()) {
            tracing::error!("{}", e);
        }
        self.stats.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::error!(
            job_id = job.id,
            note_id = job.note_id,
            target_language = %job.target_language,
            "翻译笔记 {} 失败: {}",
            job.note_id,
            reason
        );
        JobReport::from_job(&job, JobOutcome::Failed { reason })
    }

    fn supersede(&self, mut job: TranslationJob, latest: JobId) -> JobReport {
        let reason = format!("superseded by job {}", latest);
        if let Err(e) = job.fail(reason) {
            tracing::error!("{}", e);
        }
        self.stats.discarded_stale.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            job_id = job.id,
            note_id = job.note_id,
            "任务结果已被任务 {} 取代，丢弃",
            latest
        );
        JobReport::from_job(&job, JobOutcome::Superseded { latest })
    }

    fn dead_letter(&self, job: &TranslationJob, error: &NoteError) {
        self.stats.dead_lettered.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(
            job_id = job.id,
            note_id = job.note_id,
            "任务重试 {} 次后仍失败，转入死信列表",
            job.attempts().saturating_sub(1)
        );
        self.dead_letters.push(DeadLetter {
            job_id: job.id,
            note_id: job.note_id,
            target_language: job.target_language.clone(),
            attempts: job.attempts(),
            reason: error.to_string(),
            failed_at: Utc::now(),
        });
    }
}

/// 任务调度循环
///
/// 从队列接收任务，在信号量许可范围内并发执行。
pub struct WorkerPool {
    worker: Arc<TranslationWorker>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
}

impl WorkerPool {
    pub fn new(worker: Arc<TranslationWorker>) -> Self {
        let concurrency = worker.config().concurrency.max(1);
        Self {
            worker,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
        }
    }

    /// 运行到 `shutdown` 完成
    ///
    /// 停止后不再接受新任务，已入队的任务仍会执行完毕。
    pub async fn run_until<F>(self, mut receiver: JobReceiver, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!("翻译工作池启动，并发数: {}", self.concurrency);
        tokio::pin!(shutdown);
        let mut closing = false;

        loop {
            let next = if closing {
                Some(receiver.recv().await)
            } else {
                tokio::select! {
                    job = receiver.recv() => Some(job),
                    _ = &mut shutdown => None,
                }
            };

            let Some(job) = next else {
                closing = true;
                receiver.close();
                tracing::info!("翻译工作池停止接收新任务");
                continue;
            };
            let Some(job) = job else { break };
            self.dispatch(job).await;
        }

        // 等待所有在途任务结束
        if self
            .semaphore
            .acquire_many(self.concurrency as u32)
            .await
            .is_err()
        {
            tracing::warn!("信号量已关闭，无法等待在途任务");
        }
        tracing::info!("翻译工作池已停止");
    }

    async fn dispatch(&self, job: TranslationJob) {
        let permit = match Arc::clone(&self.semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                tracing::error!("获取并发许可失败，任务 {} 被丢弃: {}", job.id, e);
                return;
            }
        };

        let worker = Arc::clone(&self.worker);
        tokio::spawn(async move {
            let _permit = permit;
            worker.execute(job).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{MemoryNoteCache, DEFAULT_TTL};
    use crate::model::{NewNote, NoteSnapshot};
    use crate::repository::MemoryNoteRepository;
    use std::sync::atomic::AtomicU32;

    struct Fixture {
        repository: Arc<MemoryNoteRepository>,
        cache: Arc<MemoryNoteCache>,
        ledger: Arc<DispatchLedger>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                repository: Arc::new(MemoryNoteRepository::new()),
                cache: Arc::new(MemoryNoteCache::new()),
                ledger: Arc::new(DispatchLedger::new()),
            }
        }

        fn worker<T: Translator + 'static>(&self, translator: T, config: WorkerConfig) -> TranslationWorker {
            TranslationWorker::new(
                self.repository.clone(),
                self.cache.clone(),
                Arc::new(translator),
                Arc::clone(&self.ledger),
                config,
            )
        }
    }

    fn bonjour(_: &str, _: &str, _: &str) -> NoteResult<String> {
        Ok("Bonjour".to_string())
    }

    #[tokio::test]
    async fn test_success_writes_translation_and_invalidates_cache() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        fx.cache.set(note.id, NoteSnapshot::from_note(&note).unwrap(), DEFAULT_TTL);

        let worker = fx.worker(bonjour, WorkerConfig::default());
        let report = worker.execute(TranslationJob::new(1, note.id, "fr")).await;

        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.attempts, 1);
        let stored = fx.repository.get(note.id).unwrap();
        assert_eq!(stored.translated_text(), Some("Bonjour"));
        assert_eq!(stored.translated_language(), Some("fr"));
        assert!(!fx.cache.contains(note.id));
        assert_eq!(worker.stats().snapshot().jobs_succeeded, 1);
    }

    #[tokio::test]
    async fn test_missing_note_fails_without_side_effects() {
        let fx = Fixture::new();
        let worker = fx.worker(bonjour, WorkerConfig::default());

        let report = worker.execute(TranslationJob::new(1, 404, "fr")).await;
        assert_eq!(report.state, JobState::Failed);
        assert_eq!(
            report.outcome,
            JobOutcome::Failed {
                reason: "note not found".to_string()
            }
        );
        assert_eq!(report.attempts, 0);
        assert_eq!(fx.cache.stats().deletes, 0);
    }

    #[tokio::test]
    async fn test_translator_error_is_terminal_without_retry() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let failing = move |_: &str, _: &str, _: &str| -> NoteResult<String> {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(NoteError::TranslationFailed("model unavailable".into()))
        };

        let worker = fx.worker(failing, WorkerConfig::default());
        let report = worker.execute(TranslationJob::new(1, note.id, "fr")).await;

        assert_eq!(report.state, JobState::Failed);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(fx.repository.get(note.id).unwrap().translation(), None);
        assert_eq!(fx.cache.stats().deletes, 0);
        assert!(worker.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn test_retry_with_backoff_then_success() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let flaky = move |_: &str, _: &str, _: &str| -> NoteResult<String> {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(NoteError::TranslationFailed("busy".into()))
            } else {
                Ok("Hallo".to_string())
            }
        };

        let config = WorkerConfig {
            max_retries: 3,
            retry_base_delay_ms: 1,
            ..Default::default()
        };
        let worker = fx.worker(flaky, config);
        let report = worker.execute(TranslationJob::new(1, note.id, "de")).await;

        assert_eq!(report.state, JobState::Succeeded);
        assert_eq!(report.attempts, 3);
        assert_eq!(worker.stats().snapshot().retries, 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_go_to_dead_letters() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        let failing = |_: &str, _: &str, _: &str| -> NoteResult<String> {
            Err(NoteError::TranslationFailed("down".into()))
        };

        let config = WorkerConfig {
            max_retries: 2,
            retry_base_delay_ms: 1,
            ..Default::default()
        };
        let worker = fx.worker(failing, config);
        let report = worker.execute(TranslationJob::new(9, note.id, "de")).await;

        assert_eq!(report.state, JobState::Failed);
        assert_eq!(report.attempts, 3);
        let letters = worker.dead_letters().snapshot();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].job_id, 9);
        assert_eq!(letters[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_timeout_fails_job() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        let slow = |_: &str, _: &str, _: &str| -> NoteResult<String> {
            std::thread::sleep(Duration::from_millis(200));
            Ok("late".to_string())
        };

        let config = WorkerConfig {
            translation_timeout_ms: Some(20),
            ..Default::default()
        };
        let worker = fx.worker(slow, config);
        let report = worker.execute(TranslationJob::new(1, note.id, "fr")).await;

        assert_eq!(report.state, JobState::Failed);
        assert!(matches!(report.outcome, JobOutcome::Failed { ref reason } if reason.contains("超时")));
        assert_eq!(fx.repository.get(note.id).unwrap().translation(), None);
    }

    #[tokio::test]
    async fn test_latest_dispatch_only_discards_stale_result() {
        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        fx.ledger.record(note.id, 1);
        fx.ledger.record(note.id, 2);

        let config = WorkerConfig {
            commit_policy: CommitPolicy::LatestDispatchOnly,
            ..Default::default()
        };
        let worker = fx.worker(bonjour, config);

        let stale = worker.execute(TranslationJob::new(1, note.id, "fr")).await;
        assert_eq!(stale.outcome, JobOutcome::Superseded { latest: 2 });
        assert_eq!(fx.repository.get(note.id).unwrap().translation(), None);

        let latest = worker.execute(TranslationJob::new(2, note.id, "fr")).await;
        assert_eq!(latest.state, JobState::Succeeded);
    }

    #[tokio::test]
    async fn test_pool_drains_queue_on_shutdown() {
        use crate::jobs::{ChannelJobQueue, JobQueue};

        let fx = Fixture::new();
        let note = fx.repository.create(NewNote::new("T", "Hello", "en")).unwrap();
        let (queue, receiver) = ChannelJobQueue::new(8, Arc::clone(&fx.ledger));
        queue.enqueue(note.id, "fr").unwrap();
        queue.enqueue(note.id, "de").unwrap();

        let worker = Arc::new(fx.worker(bonjour, WorkerConfig::default()));
        let stats = worker.stats();
        WorkerPool::new(worker).run_until(receiver, async {}).await;

        assert_eq!(stats.snapshot().jobs_succeeded, 2);
        assert_eq!(stats.snapshot().in_flight, 0);
    }

    #[test]
    fn test_retry_delay_is_exponential() {
        let config = WorkerConfig {
            retry_base_delay_ms: 100,
            ..Default::default()
        };
        assert_eq!(config.retry_delay(1), Duration::from_millis(100));
        assert_eq!(config.retry_delay(2), Duration::from_millis(200));
        assert_eq!(config.retry_delay(4), Duration::from_millis(800));
    }

    #[test]
    fn test_commit_policy_parsing() {
        assert_eq!(
            "latest-dispatch-only".parse::<CommitPolicy>().unwrap(),
            CommitPolicy::LatestDispatchOnly
        );
        assert_eq!("LWW".parse::<CommitPolicy>().unwrap(), CommitPolicy::LastWriteWins);
        assert!("fifo".parse::<CommitPolicy>().is_err());
    }
}
