//! 笔记仓库
//!
//! 只负责笔记的持久化 CRUD，不包含缓存或业务逻辑。
//!
//! - `MemoryNoteRepository` - 进程内存储，用于开发和测试
//! - `RedbNoteRepository` - 基于 redb 的持久化存储

pub mod durable;
pub mod memory;

pub use durable::RedbNoteRepository;
pub use memory::MemoryNoteRepository;

use crate::error::NoteResult;
use crate::model::{NewNote, Note, NoteChanges, NoteId};

/// 笔记仓库接口
///
/// 所有操作同步执行，并且对仓库自身是强一致的：
/// `update` 之后立即 `get` 能看到更新后的值。
pub trait NoteRepository: Send + Sync {
    /// 创建笔记并分配标识符
    fn create(&self, fields: NewNote) -> NoteResult<Note>;

    /// 按标识符获取笔记，不存在时返回 `NotFound`
    fn get(&self, id: NoteId) -> NoteResult<Note>;

    /// 应用变更并刷新 `updated_at`，不存在时返回 `NotFound`
    fn update(&self, id: NoteId, changes: NoteChanges) -> NoteResult<Note>;

    /// 删除笔记，不存在时返回 `NotFound`
    fn delete(&self, id: NoteId) -> NoteResult<()>;

    /// 按创建时间倒序列出所有笔记
    fn list(&self) -> NoteResult<Vec<Note>>;
}

/// 按 `created_at` 倒序排列，创建时间相同时按标识符倒序
pub(crate) fn sort_newest_first(notes: &mut [Note]) {
    notes.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}
