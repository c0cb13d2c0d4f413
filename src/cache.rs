//! 笔记缓存
//!
//! 以笔记标识符为键保存最近一次返回的序列化快照。缓存只用于读加速，
//! 永远不是数据的权威来源：条目只会整体写入或整体删除，过期后视为未命中。

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;
use serde::Serialize;

use crate::model::{NoteId, NoteSnapshot};

/// 默认缓存有效期
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);
/// 默认缓存容量
pub const DEFAULT_CAPACITY: usize = 10_000;

/// 缓存接口
///
/// 所有操作都是尽力而为的，不返回错误。`delete` 是幂等的。
pub trait NoteCache: Send + Sync {
    /// 获取未过期的快照
    fn get(&self, id: NoteId) -> Option<NoteSnapshot>;

    /// 整体写入快照
    fn set(&self, id: NoteId, snapshot: NoteSnapshot, ttl: Duration);

    /// 删除条目，键不存在时什么也不做
    fn delete(&self, id: NoteId);

    /// 当前失效代数，每次 `delete` 都会推进
    fn generation(&self, _id: NoteId) -> u64 {
        0
    }

    /// 仅当失效代数仍为 `generation` 时写入，返回是否写入
    ///
    /// 读取方在查询仓库前记录代数，若其间发生了写入后的失效，
    /// 旧快照就不会再被放回缓存。
    fn set_if_generation(
        &self,
        id: NoteId,
        snapshot: NoteSnapshot,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        let _ = generation;
        self.set(id, snapshot, ttl);
        true
    }

    /// 统计信息
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

/// 缓存统计信息
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub expired: u64,
    pub evictions: u64,
    pub stale_sets_skipped: u64,
    pub entries: usize,
}

impl CacheStats {
    /// 计算缓存命中率
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// 缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    snapshot: NoteSnapshot,
    inserted_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(snapshot: NoteSnapshot, ttl: Duration) -> Self {
        Self {
            snapshot,
            inserted_at: Instant::now(),
            ttl,
        }
    }

    /// 检查条目是否过期
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

struct Inner {
    entries: LruCache<NoteId, CacheEntry>,
    /// 最近失效过的键的代数，容量与条目相同
    generations: LruCache<NoteId, u64>,
    /// 没有单独记录的键使用的代数，只增不减
    generation_floor: u64,
    next_generation: u64,
    stats: CacheStats,
}

impl Inner {
    fn generation(&self, id: NoteId) -> u64 {
        self.generations
            .peek(&id)
            .copied()
            .unwrap_or(self.generation_floor)
    }

    /// 推进某个键的代数
    ///
    /// 被挤出的记录把它的代数并入下限，因此读取期间发生过的失效
    /// 即使记录已被淘汰也仍然可见。
    fn bump_generation(&mut self, id: NoteId) {
        self.next_generation += 1;
        let generation = self.next_generation;
        if let Some((evicted, old)) = self.generations.push(id, generation) {
            if evicted != id {
                self.generation_floor = self.generation_floor.max(old);
            }
        }
    }

    fn insert(&mut self, id: NoteId, snapshot: NoteSnapshot, ttl: Duration) {
        if let Some((evicted, _)) = self.entries.push(id, CacheEntry::new(snapshot, ttl)) {
            if evicted != id {
                self.stats.evictions += 1;
            }
        }
        self.stats.sets += 1;
    }
}

/// 进程内 LRU 缓存，支持按条目 TTL 过期
pub struct MemoryNoteCache {
    inner: Mutex<Inner>,
}

impl MemoryNoteCache {
    /// 使用默认容量创建缓存
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 使用指定容量创建缓存
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                generations: LruCache::new(capacity),
                generation_floor: 0,
                next_generation: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 是否存在未过期的条目（不影响统计和 LRU 顺序）
    pub fn contains(&self, id: NoteId) -> bool {
        self.lock()
            .entries
            .peek(&id)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    /// 当前条目数量（包括尚未清理的过期条目）
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 清理过期条目，返回清理数量
    pub fn cleanup_expired(&self) -> usize {
        let mut inner = self.lock();
        let expired: Vec<NoteId> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(id, _)| *id)
            .collect();

        for id in &expired {
            inner.entries.pop(id);
        }
        inner.stats.expired += expired.len() as u64;
        expired.len()
    }
}

impl Default for MemoryNoteCache {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteCache for MemoryNoteCache {
    fn get(&self, id: NoteId) -> Option<NoteSnapshot> {
        let mut guard = self.lock();
        let inner = &mut *guard;

        let expired = match inner.entries.get(&id) {
            Some(entry) if !entry.is_expired() => {
                let snapshot = entry.snapshot.clone();
                inner.stats.hits += 1;
                tracing::debug!("缓存命中: note {}", id);
                return Some(snapshot);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.entries.pop(&id);
            inner.stats.expired += 1;
        }
        inner.stats.misses += 1;
        tracing::debug!("缓存未命中: note {}", id);
        None
    }

    fn set(&self, id: NoteId, snapshot: NoteSnapshot, ttl: Duration) {
        self.lock().insert(id, snapshot, ttl);
    }

    fn delete(&self, id: NoteId) {
        let mut inner = self.lock();
        inner.entries.pop(&id);
        inner.bump_generation(id);
        inner.stats.deletes += 1;
    }

    fn generation(&self, id: NoteId) -> u64 {
        self.lock().generation(id)
    }

    fn set_if_generation(
        &self,
        id: NoteId,
        snapshot: NoteSnapshot,
        ttl: Duration,
        generation: u64,
    ) -> bool {
        let mut inner = self.lock();
        if inner.generation(id) != generation {
            inner.stats.stale_sets_skipped += 1;
            tracing::debug!("快照在读取期间已失效，跳过写入缓存: note {}", id);
            return false;
        }
        inner.insert(id, snapshot, ttl);
        true
    }

    fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut stats = inner.stats.clone();
        stats.entries = inner.entries.len();
        stats
    }
}

/// 禁用缓存时使用：所有读取均未命中
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

impl NoteCache for NoCache {
    fn get(&self, _id: NoteId) -> Option<NoteSnapshot> {
        None
    }

    fn set(&self, _id: NoteId, _snapshot: NoteSnapshot, _ttl: Duration) {}

    fn delete(&self, _id: NoteId) {}
}
