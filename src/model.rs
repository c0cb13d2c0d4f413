//! 笔记数据模型
//!
//! 定义笔记实体、创建/更新载荷以及缓存中保存的序列化快照

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{helpers::validation_error, NoteResult};

/// 笔记标识符，创建时分配且不可变
pub type NoteId = u64;

/// 标题最大字符数
pub const TITLE_MAX_CHARS: usize = 200;
/// 语言代码最大字符数
pub const LANGUAGE_MAX_CHARS: usize = 50;
/// 未指定原文语言时使用的默认值
pub const DEFAULT_ORIGINAL_LANGUAGE: &str = "en";

fn default_original_language() -> String {
    DEFAULT_ORIGINAL_LANGUAGE.to_string()
}

/// 一次成功翻译的结果
///
/// 译文和目标语言总是成对出现，笔记上不会只设置其中一个。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub language: String,
}

impl Translation {
    pub fn new(text: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language: language.into(),
        }
    }
}

/// 笔记实体
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    pub original_text: String,
    pub original_language: String,
    translated_text: Option<String>,
    translated_language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// 由已验证的创建载荷生成新笔记
    pub fn new(id: NoteId, fields: NewNote, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: fields.title,
            original_text: fields.original_text,
            original_language: fields.original_language,
            translated_text: None,
            translated_language: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn translated_text(&self) -> Option<&str> {
        self.translated_text.as_deref()
    }

    pub fn translated_language(&self) -> Option<&str> {
        self.translated_language.as_deref()
    }

    /// 当前译文（译文与语言同时存在时才返回）
    pub fn translation(&self) -> Option<Translation> {
        match (&self.translated_text, &self.translated_language) {
            (Some(text), Some(language)) => Some(Translation::new(text.clone(), language.clone())),
            _ => None,
        }
    }

    /// 应用变更并刷新 `updated_at`
    pub fn apply(&mut self, changes: NoteChanges, now: DateTime<Utc>) {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(text) = changes.original_text {
            self.original_text = text;
        }
        if let Some(language) = changes.original_language {
            self.original_language = language;
        }
        if let Some(translation) = changes.translation {
            self.translated_text = Some(translation.text);
            self.translated_language = Some(translation.language);
        }
        self.updated_at = now;
    }
}

/// 创建笔记的载荷，也用作整体替换（PUT）的载荷
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewNote {
    pub title: String,
    pub original_text: String,
    #[serde(default = "default_original_language")]
    pub original_language: String,
}

impl NewNote {
    pub fn new(
        title: impl Into<String>,
        original_text: impl Into<String>,
        original_language: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            original_text: original_text.into(),
            original_language: original_language.into(),
        }
    }

    /// 验证字段
    pub fn validate(&self) -> NoteResult<()> {
        validate_title(&self.title)?;
        validate_text(&self.original_text)?;
        validate_language("original_language", &self.original_language)
    }
}

/// 笔记的部分更新
///
/// `translation` 不会从客户端载荷中反序列化，只有翻译任务能写入。
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NoteChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub original_text: Option<String>,
    #[serde(default)]
    pub original_language: Option<String>,
    #[serde(skip)]
    pub translation: Option<Translation>,
}

impl NoteChanges {
    /// 仅写入翻译结果的变更
    pub fn translated(translation: Translation) -> Self {
        Self {
            translation: Some(translation),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.original_text.is_none()
            && self.original_language.is_none()
            && self.translation.is_none()
    }

    /// 验证出现的字段
    pub fn validate(&self) -> NoteResult<()> {
        if let Some(ref title) = self.title {
            validate_title(title)?;
        }
        if let Some(ref text) = self.original_text {
            validate_text(text)?;
        }
        if let Some(ref language) = self.original_language {
            validate_language("original_language", language)?;
        }
        if let Some(ref translation) = self.translation {
            validate_language("translated_language", &translation.language)?;
        }
        Ok(())
    }
}

impl From<NewNote> for NoteChanges {
    fn from(note: NewNote) -> Self {
        Self {
            title: Some(note.title),
            original_text: Some(note.original_text),
            original_language: Some(note.original_language),
            translation: None,
        }
    }
}

/// 缓存中保存的笔记序列化快照
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteSnapshot(String);

impl NoteSnapshot {
    pub fn from_note(note: &Note) -> NoteResult<Self> {
        Ok(Self(serde_json::to_string(note)?))
    }

    pub fn from_json(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// 反序列化回笔记实体
    pub fn to_note(&self) -> NoteResult<Note> {
        Ok(serde_json::from_str(&self.0)?)
    }
}

fn validate_title(title: &str) -> NoteResult<()> {
    if title.trim().is_empty() {
        return Err(validation_error("title may not be blank."));
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(validation_error(format!(
            "title must have no more than {} characters.",
            TITLE_MAX_CHARS
        )));
    }
    Ok(())
}

fn validate_text(text: &str) -> NoteResult<()> {
    if text.trim().is_empty() {
        return Err(validation_error("original_text may not be blank."));
    }
    Ok(())
}

/// 验证语言代码：非空且不超过字段长度
pub fn validate_language(field: &str, language: &str) -> NoteResult<()> {
    if language.trim().is_empty() {
        return Err(validation_error(format!("{} may not be blank.", field)));
    }
    if language.chars().count() > LANGUAGE_MAX_CHARS {
        return Err(validation_error(format!(
            "{} must have no more than {} characters.",
            field, LANGUAGE_MAX_CHARS
        )));
    }
    Ok(())
}
