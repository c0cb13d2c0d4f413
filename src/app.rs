//! 组件装配
//!
//! 根据 [`AppConfig`] 构建仓库、缓存、任务队列、工作者和笔记服务，
//! 所有依赖都在这里显式注入。

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::cache::{MemoryNoteCache, NoCache, NoteCache};
use crate::config::AppConfig;
use crate::error::NoteResult;
use crate::jobs::{ChannelJobQueue, DispatchLedger, JobReceiver};
use crate::repository::{MemoryNoteRepository, NoteRepository, RedbNoteRepository};
use crate::service::NoteService;
use crate::translator::Translator;
use crate::worker::{TranslationWorker, WorkerPool};

/// 装配完成的应用
pub struct Application {
    service: Arc<NoteService>,
    worker: Arc<TranslationWorker>,
    receiver: JobReceiver,
    memory_cache: Option<Arc<MemoryNoteCache>>,
}

impl Application {
    /// 按配置构建全部组件
    pub fn build(config: &AppConfig, translator: Arc<dyn Translator>) -> NoteResult<Self> {
        let repository: Arc<dyn NoteRepository> = match config.storage.path {
            Some(ref path) => Arc::new(RedbNoteRepository::open(path)?),
            None => {
                tracing::info!("未配置存储路径，笔记只保存在内存中");
                Arc::new(MemoryNoteRepository::new())
            }
        };
        Self::with_repository(config, repository, translator)
    }

    /// 使用给定的仓库构建其余组件
    pub fn with_repository(
        config: &AppConfig,
        repository: Arc<dyn NoteRepository>,
        translator: Arc<dyn Translator>,
    ) -> NoteResult<Self> {
        let memory_cache = if config.cache.enabled {
            Some(Arc::new(MemoryNoteCache::with_capacity(config.cache.capacity)))
        } else {
            tracing::warn!("笔记缓存已禁用");
            None
        };
        let cache: Arc<dyn NoteCache> = match memory_cache {
            Some(ref memory) => memory.clone(),
            None => Arc::new(NoCache),
        };

        let ledger = Arc::new(DispatchLedger::new());
        let (queue, receiver) =
            ChannelJobQueue::new(config.worker.queue_capacity, Arc::clone(&ledger));

        let worker = Arc::new(TranslationWorker::new(
            Arc::clone(&repository),
            Arc::clone(&cache),
            translator,
            ledger,
            config.worker.clone(),
        ));

        let service = Arc::new(NoteService::with_cache_ttl(
            repository,
            cache,
            Arc::new(queue),
            config.cache.ttl(),
        ));

        tracing::info!(
            "组件装配完成: 缓存 {}，并发 {}，提交策略 {:?}",
            if config.cache.enabled { "启用" } else { "禁用" },
            config.worker.concurrency,
            config.worker.commit_policy
        );

        Ok(Self {
            service,
            worker,
            receiver,
            memory_cache,
        })
    }

    pub fn service(&self) -> Arc<NoteService> {
        Arc::clone(&self.service)
    }

    pub fn worker(&self) -> Arc<TranslationWorker> {
        Arc::clone(&self.worker)
    }

    /// Web 层共享状态
    #[cfg(feature = "web")]
    pub fn app_state(&self) -> Arc<crate::web::AppState> {
        Arc::new(crate::web::AppState {
            service: self.service(),
            worker_stats: self.worker.stats(),
            dead_letters: self.worker.dead_letters(),
        })
    }

    /// 定期清理过期缓存条目，缓存禁用时返回 `None`
    pub fn spawn_cache_janitor(&self, every: Duration) -> Option<JoinHandle<()>> {
        let cache = self.memory_cache.clone()?;
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = cache.cleanup_expired();
                if removed > 0 {
                    tracing::debug!("清理过期缓存条目: {}", removed);
                }
            }
        }))
    }

    /// 启动工作池，`shutdown` 完成后排空队列并退出
    pub fn spawn_workers<F>(self, shutdown: F) -> (Arc<NoteService>, JoinHandle<()>)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let pool = WorkerPool::new(self.worker);
        let handle = tokio::spawn(pool.run_until(self.receiver, shutdown));
        (self.service, handle)
    }
}
