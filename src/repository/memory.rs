//! 进程内笔记仓库

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use chrono::Utc;

use super::{sort_newest_first, NoteRepository};
use crate::error::{NoteError, NoteResult};
use crate::model::{NewNote, Note, NoteChanges, NoteId};

/// 基于 `RwLock<BTreeMap>` 的内存仓库
#[derive(Debug)]
pub struct MemoryNoteRepository {
    notes: RwLock<BTreeMap<NoteId, Note>>,
    next_id: AtomicU64,
}

impl MemoryNoteRepository {
    pub fn new() -> Self {
        Self {
            notes: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 当前笔记数量
    pub fn len(&self) -> usize {
        self.notes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryNoteRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl NoteRepository for MemoryNoteRepository {
    fn create(&self, fields: NewNote) -> NoteResult<Note> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let note = Note::new(id, fields, Utc::now());

        let mut notes = self.notes.write().unwrap_or_else(PoisonError::into_inner);
        notes.insert(id, note.clone());
        Ok(note)
    }

    fn get(&self, id: NoteId) -> NoteResult<Note> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        notes.get(&id).cloned().ok_or(NoteError::NotFound(id))
    }

    fn update(&self, id: NoteId, changes: NoteChanges) -> NoteResult<Note> {
        let mut notes = self.notes.write().unwrap_or_else(PoisonError::into_inner);
        let note = notes.get_mut(&id).ok_or(NoteError::NotFound(id))?;
        note.apply(changes, Utc::now());
        Ok(note.clone())
    }

    fn delete(&self, id: NoteId) -> NoteResult<()> {
        let mut notes = self.notes.write().unwrap_or_else(PoisonError::into_inner);
        notes.remove(&id).map(|_| ()).ok_or(NoteError::NotFound(id))
    }

    fn list(&self) -> NoteResult<Vec<Note>> {
        let notes = self.notes.read().unwrap_or_else(PoisonError::into_inner);
        let mut all: Vec<Note> = notes.values().cloned().collect();
        sort_newest_first(&mut all);
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Translation;

    #[test]
    fn test_crud_round() {
        let repo = MemoryNoteRepository::new();
        let note = repo.create(NewNote::new("T", "Hello", "en")).unwrap();
        assert_eq!(note.id, 1);
        assert_eq!(repo.get(1).unwrap(), note);

        let changes = NoteChanges {
            title: Some("Renamed".into()),
            ..Default::default()
        };
        let updated = repo.update(1, changes).unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(repo.get(1).unwrap().title, "Renamed");
        assert!(updated.updated_at >= note.updated_at);

        repo.delete(1).unwrap();
        assert_eq!(repo.get(1), Err(NoteError::NotFound(1)));
        assert!(repo.is_empty());
    }

    #[test]
    fn test_missing_note_operations() {
        let repo = MemoryNoteRepository::new();
        assert_eq!(
            repo.update(9, NoteChanges::translated(Translation::new("x", "fr"))),
            Err(NoteError::NotFound(9))
        );
        assert_eq!(repo.delete(9), Err(NoteError::NotFound(9)));
    }

    #[test]
    fn test_list_newest_first() {
        let repo = MemoryNoteRepository::new();
        for title in ["a", "b", "c"] {
            repo.create(NewNote::new(title, "text", "en")).unwrap();
        }

        let ids: Vec<NoteId> = repo.list().unwrap().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let repo = MemoryNoteRepository::new();
        let first = repo.create(NewNote::new("a", "text", "en")).unwrap();
        repo.delete(first.id).unwrap();
        let second = repo.create(NewNote::new("b", "text", "en")).unwrap();
        assert_ne!(first.id, second.id);
    }
}
