//! 笔记服务
//!
//! 面向请求的协调层：读写仓库与缓存，并把翻译请求交给任务队列。
//!
//! ## 缓存纪律
//!
//! - `read`：先查缓存，未命中时从仓库读取并回填
//! - `create`：只写仓库，不触碰缓存
//! - `update`/`delete`：写入后无条件删除缓存条目，从不直接刷新缓存；
//!   删除成功后还会丢弃该笔记的派发记录
//! - `request_translation`：通过仓库而非缓存确认笔记存在，然后入队
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use notelingo::cache::MemoryNoteCache;
//! use notelingo::jobs::{ChannelJobQueue, DispatchLedger};
//! use notelingo::model::NewNote;
//! use notelingo::repository::MemoryNoteRepository;
//! use notelingo::service::NoteService;
//!
//! # fn main() -> notelingo::NoteResult<()> {
//! let (queue, _receiver) = ChannelJobQueue::new(16, Arc::new(DispatchLedger::new()));
//! let service = NoteService::new(
//!     Arc::new(MemoryNoteRepository::new()),
//!     Arc::new(MemoryNoteCache::new()),
//!     Arc::new(queue),
//! );
//!
//! let note = service.create(NewNote::new("T", "Hello", "en"))?;
//! let job_id = service.request_translation(note.id, "fr")?;
//! println!("任务 {} 已提交", job_id);
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{NoteCache, DEFAULT_TTL};
use crate::error::{NoteError, NoteResult};
use crate::jobs::{JobId, JobQueue};
use crate::model::{validate_language, NewNote, Note, NoteChanges, NoteId, NoteSnapshot};
use crate::repository::NoteRepository;

/// 缺少目标语言时返回给调用方的消息
pub const MISSING_TARGET_LANGUAGE: &str = "Target language not provided.";

/// 服务统计信息（线程安全版本）
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub reads: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub repository_reads: AtomicUsize,
    pub notes_created: AtomicUsize,
    pub notes_updated: AtomicUsize,
    pub notes_deleted: AtomicUsize,
    pub invalidations: AtomicUsize,
    pub translations_requested: AtomicUsize,
    pub translations_rejected: AtomicUsize,
}

impl ServiceStats {
    fn bump(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            reads: self.reads.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            repository_reads: self.repository_reads.load(Ordering::Relaxed),
            notes_created: self.notes_created.load(Ordering::Relaxed),
            notes_updated: self.notes_updated.load(Ordering::Relaxed),
            notes_deleted: self.notes_deleted.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            translations_requested: self.translations_requested.load(Ordering::Relaxed),
            translations_rejected: self.translations_rejected.load(Ordering::Relaxed),
        }
    }
}

/// 服务统计数据的不可变快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStatsSnapshot {
    pub reads: usize,
    pub cache_hits: usize,
    pub repository_reads: usize,
    pub notes_created: usize,
    pub notes_updated: usize,
    pub notes_deleted: usize,
    pub invalidations: usize,
    pub translations_requested: usize,
    pub translations_rejected: usize,
}

/// 笔记服务
///
/// 仓库、缓存和任务队列都由调用方注入，服务本身不持有全局状态，
/// 测试可以替换任意一个依赖。
pub struct NoteService {
    repository: Arc<dyn NoteRepository>,
    cache: Arc<dyn NoteCache>,
    queue: Arc<dyn JobQueue>,
    cache_ttl: Duration,
    stats: ServiceStats,
}

impl NoteService {
    /// 使用默认缓存有效期创建服务
    pub fn new(
        repository: Arc<dyn NoteRepository>,
        cache: Arc<dyn NoteCache>,
        queue: Arc<dyn JobQueue>,
    ) -> Self {
        Self::with_cache_ttl(repository, cache, queue, DEFAULT_TTL)
    }

    pub fn with_cache_ttl(
        repository: Arc<dyn NoteRepository>,
        cache: Arc<dyn NoteCache>,
        queue: Arc<dyn JobQueue>,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            repository,
            cache,
            queue,
            cache_ttl,
            stats: ServiceStats::default(),
        }
    }

    pub fn cache(&self) -> &Arc<dyn NoteCache> {
        &self.cache
    }

    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    /// 按创建时间倒序列出全部笔记
    pub fn list(&self) -> NoteResult<Vec<Note>> {
        self.repository.list()
    }

    /// 读取笔记快照
    ///
    /// 缓存命中时不访问仓库。未命中时从仓库读取、序列化并回填缓存，
    /// 回填只在读取期间没有发生失效时进行。
    ///
    /// # 错误
    ///
    /// - `NotFound`：笔记不存在
    /// - `Serialization`：笔记无法序列化
    pub fn read(&self, id: NoteId) -> NoteResult<NoteSnapshot> {
        ServiceStats::bump(&self.stats.reads);

        let generation = self.cache.generation(id);
        if let Some(snapshot) = self.cache.get(id) {
            ServiceStats::bump(&self.stats.cache_hits);
            return Ok(snapshot);
        }

        ServiceStats::bump(&self.stats.repository_reads);
        let note = self.repository.get(id)?;
        let snapshot = NoteSnapshot::from_note(&note)?;
        self.cache
            .set_if_generation(id, snapshot.clone(), self.cache_ttl, generation);

        Ok(snapshot)
    }

    /// 读取笔记并反序列化为实体
    pub fn read_note(&self, id: NoteId) -> NoteResult<Note> {
        self.read(id)?.to_note()
    }

    /// 创建笔记，只写仓库
    pub fn create(&self, fields: NewNote) -> NoteResult<Note> {
        fields.validate()?;
        let note = self.repository.create(fields)?;
        ServiceStats::bump(&self.stats.notes_created);
        tracing::info!(note_id = note.id, "创建笔记: {}", note.title);
        Ok(note)
    }

    /// 更新笔记
    ///
    /// 译文字段不能通过这里写入。仓库写入成功后无条件删除缓存条目，
    /// 正在执行的翻译任务不会被取消。
    ///
    /// # 错误
    ///
    /// - `InvalidArgument`：字段验证失败
    /// - `NotFound`：笔记不存在
    pub fn update(&self, id: NoteId, mut changes: NoteChanges) -> NoteResult<Note> {
        changes.translation = None;
        changes.validate()?;

        let note = self.repository.update(id, changes)?;
        self.invalidate(id);
        ServiceStats::bump(&self.stats.notes_updated);
        tracing::info!(note_id = id, "更新笔记");
        Ok(note)
    }

    /// 删除笔记
    ///
    /// 无论仓库删除是否成功都会删除缓存条目。删除成功后同时丢弃
    /// 队列为该笔记保存的派发记录。
    pub fn delete(&self, id: NoteId) -> NoteResult<()> {
        let result = self.repository.delete(id);
        self.invalidate(id);

        result?;
        self.queue.forget(id);
        ServiceStats::bump(&self.stats.notes_deleted);
        tracing::info!(note_id = id, "删除笔记");
        Ok(())
    }

    /// 请求把笔记翻译为目标语言
    ///
    /// 只负责入队，立即返回任务号，不等待翻译完成。同一笔记的多个请求
    /// 都会被接受。
    ///
    /// # 参数
    ///
    /// * `id` - 笔记标识符
    /// * `target_language` - 目标语言代码，不能为空
    ///
    /// # 错误
    ///
    /// - `InvalidArgument`：目标语言为空或过长，此时不会入队
    /// - `NotFound`：笔记不存在，此时不会入队
    /// - `QueueUnavailable`：队列已满或已关闭
    pub fn request_translation(&self, id: NoteId, target_language: &str) -> NoteResult<JobId> {
        let target_language = target_language.trim();
        if target_language.is_empty() {
            ServiceStats::bump(&self.stats.translations_rejected);
            return Err(NoteError::InvalidArgument(
                MISSING_TARGET_LANGUAGE.to_string(),
            ));
        }
        if let Err(e) = validate_language("target_language", target_language) {
            ServiceStats::bump(&self.stats.translations_rejected);
            return Err(e);
        }

        // 存在性以仓库为准
        if let Err(e) = self.repository.get(id) {
            ServiceStats::bump(&self.stats.translations_rejected);
            return Err(e);
        }

        let job_id = self.queue.enqueue(id, target_language)?;
        ServiceStats::bump(&self.stats.translations_requested);
        tracing::info!(
            note_id = id,
            job_id,
            "翻译任务已提交: {}",
            target_language
        );
        Ok(job_id)
    }

    fn invalidate(&self, id: NoteId) {
        self.cache.delete(id);
        ServiceStats::bump(&self.stats.invalidations);
    }
}
