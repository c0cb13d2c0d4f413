//! 基于 redb 的持久化笔记仓库
//!
//! 每条笔记以 JSON 编码存储在 `notes` 表中，标识符序列保存在 `meta` 表，
//! 删除后的标识符不会被重新分配。

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableTable, TableDefinition};

use super::{sort_newest_first, NoteRepository};
use crate::error::{NoteError, NoteResult};
use crate::model::{NewNote, Note, NoteChanges, NoteId};

const NOTES: TableDefinition<u64, &[u8]> = TableDefinition::new("notes");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");
const NEXT_ID_KEY: &str = "next_id";

fn db_err<E: Into<redb::Error>>(error: E) -> NoteError {
    NoteError::from(error.into())
}

/// redb 持久化仓库
pub struct RedbNoteRepository {
    db: Database,
}

impl RedbNoteRepository {
    /// 打开（或创建）数据库文件并确保表存在
    pub fn open(path: impl AsRef<Path>) -> NoteResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Database::create(path).map_err(db_err)?;

        let txn = db.begin_write().map_err(db_err)?;
        {
            txn.open_table(NOTES).map_err(db_err)?;
            txn.open_table(META).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;

        tracing::info!("笔记数据库已打开: {}", path.display());
        Ok(Self { db })
    }

    fn decode(bytes: &[u8]) -> NoteResult<Note> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

impl NoteRepository for RedbNoteRepository {
    fn create(&self, fields: NewNote) -> NoteResult<Note> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let note = {
            let mut meta = txn.open_table(META).map_err(db_err)?;
            let id = meta
                .get(NEXT_ID_KEY)
                .map_err(db_err)?
                .map(|guard| guard.value())
                .unwrap_or(1);
            meta.insert(NEXT_ID_KEY, id + 1).map_err(db_err)?;

            let note = Note::new(id, fields, Utc::now());
            let bytes = serde_json::to_vec(&note)?;
            let mut notes = txn.open_table(NOTES).map_err(db_err)?;
            notes.insert(id, bytes.as_slice()).map_err(db_err)?;
            note
        };
        txn.commit().map_err(db_err)?;
        Ok(note)
    }

    fn get(&self, id: NoteId) -> NoteResult<Note> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let table = txn.open_table(NOTES).map_err(db_err)?;
        let row = table.get(id).map_err(db_err)?;
        match row {
            Some(guard) => Self::decode(guard.value()),
            None => Err(NoteError::NotFound(id)),
        }
    }

    fn update(&self, id: NoteId, changes: NoteChanges) -> NoteResult<Note> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let note = {
            let mut table = txn.open_table(NOTES).map_err(db_err)?;
            let existing = match table.get(id).map_err(db_err)? {
                Some(guard) => Self::decode(guard.value())?,
                None => return Err(NoteError::NotFound(id)),
            };

            let mut note = existing;
            note.apply(changes, Utc::now());
            let bytes = serde_json::to_vec(&note)?;
            table.insert(id, bytes.as_slice()).map_err(db_err)?;
            note
        };
        txn.commit().map_err(db_err)?;
        Ok(note)
    }

    fn delete(&self, id: NoteId) -> NoteResult<()> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let removed = {
            let mut table = txn.open_table(NOTES).map_err(db_err)?;
            let guard = table.remove(id).map_err(db_err)?;
            guard.is_some()
        };
        if !removed {
            return Err(NoteError::NotFound(id));
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    fn list(&self) -> NoteResult<Vec<Note>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let table = txn.open_table(NOTES).map_err(db_err)?;

        let mut notes = Vec::new();
        for row in table.iter().map_err(db_err)? {
            let (_, value) = row.map_err(db_err)?;
            notes.push(Self::decode(value.value())?);
        }

        sort_newest_first(&mut notes);
        Ok(notes)
    }
}
