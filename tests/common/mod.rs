// 集成测试公共模块
//
// 提供可计数的仓库、记录入队的队列、脚本化翻译函数和测试环境构建器

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notelingo::cache::{MemoryNoteCache, NoteCache, DEFAULT_TTL};
use notelingo::error::{NoteError, NoteResult};
use notelingo::jobs::{ChannelJobQueue, DispatchLedger, JobId, JobQueue, JobReceiver};
use notelingo::model::{NewNote, Note, NoteChanges, NoteId};
use notelingo::repository::{MemoryNoteRepository, NoteRepository};
use notelingo::service::NoteService;
use notelingo::translator::Translator;
use notelingo::worker::{TranslationWorker, WorkerConfig};

/// 记录调用次数的仓库包装
#[derive(Default)]
pub struct CountingRepository {
    inner: MemoryNoteRepository,
    pub gets: AtomicUsize,
    pub updates: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl CountingRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

impl NoteRepository for CountingRepository {
    fn create(&self, fields: NewNote) -> NoteResult<Note> {
        self.inner.create(fields)
    }

    fn get(&self, id: NoteId) -> NoteResult<Note> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        self.inner.get(id)
    }

    fn update(&self, id: NoteId, changes: NoteChanges) -> NoteResult<Note> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(id, changes)
    }

    fn delete(&self, id: NoteId) -> NoteResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(id)
    }

    fn list(&self) -> NoteResult<Vec<Note>> {
        self.inner.list()
    }
}

/// 只记录入队请求、不执行任务的队列
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<(NoteId, String)>>,
    next_id: AtomicU64,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(&self) -> Vec<(NoteId, String)> {
        self.jobs.lock().unwrap().clone()
    }
}

impl JobQueue for RecordingQueue {
    fn enqueue(&self, note_id: NoteId, target_language: &str) -> NoteResult<JobId> {
        self.jobs
            .lock()
            .unwrap()
            .push((note_id, target_language.to_string()));
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// 总是返回固定译文
pub fn fixed_translator(text: &'static str) -> Arc<dyn Translator> {
    Arc::new(move |_: &str, _: &str, _: &str| -> NoteResult<String> { Ok(text.to_string()) })
}

/// 按目标语言返回 `[lang] 原文`
pub fn tagging_translator() -> Arc<dyn Translator> {
    Arc::new(|text: &str, _: &str, target: &str| -> NoteResult<String> {
        Ok(format!("[{}] {}", target, text))
    })
}

/// 总是失败
pub fn failing_translator(reason: &'static str) -> Arc<dyn Translator> {
    Arc::new(move |_: &str, _: &str, _: &str| -> NoteResult<String> {
        Err(NoteError::TranslationFailed(reason.to_string()))
    })
}

/// 基于内存组件的测试环境
pub struct TestEnvironment {
    pub repository: Arc<CountingRepository>,
    pub cache: Arc<MemoryNoteCache>,
    pub ledger: Arc<DispatchLedger>,
    pub service: NoteService,
    pub receiver: JobReceiver,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        let repository = Arc::new(CountingRepository::new());
        let cache = Arc::new(MemoryNoteCache::new());
        let ledger = Arc::new(DispatchLedger::new());
        let (queue, receiver) = ChannelJobQueue::new(64, Arc::clone(&ledger));

        let service = NoteService::with_cache_ttl(
            repository.clone(),
            cache.clone(),
            Arc::new(queue),
            ttl,
        );

        Self {
            repository,
            cache,
            ledger,
            service,
            receiver,
        }
    }

    /// 创建一条示例笔记
    pub fn seed(&self, title: &str, text: &str) -> Note {
        self.service
            .create(NewNote::new(title, text, "en"))
            .expect("创建笔记失败")
    }

    pub fn worker(&self, translator: Arc<dyn Translator>, config: WorkerConfig) -> TranslationWorker {
        TranslationWorker::new(
            self.repository.clone(),
            self.cache.clone(),
            translator,
            Arc::clone(&self.ledger),
            config,
        )
    }

    pub fn is_cached(&self, id: NoteId) -> bool {
        self.cache.contains(id)
    }

    pub fn cache_deletes(&self) -> u64 {
        self.cache.stats().deletes
    }
}
