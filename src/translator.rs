//! 外部翻译函数
//!
//! 翻译算法本身不在本 crate 内实现，这里只定义调用接口：
//! `translate(text, source_lang, target_lang) -> translated_text`。
//! 调用是同步的，工作池会在阻塞线程上执行它。

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::{NoteError, NoteResult};

/// 默认翻译 API 地址（DeepLX 兼容接口）
pub const DEFAULT_API_URL: &str = "http://localhost:1188/translate";
/// 默认模型名称模板
pub const DEFAULT_MODEL_TEMPLATE: &str = "Helsinki-NLP/opus-mt-{source}-{target}";
/// 单次请求默认超时
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// 外部翻译函数接口
pub trait Translator: Send + Sync {
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> NoteResult<String>;
}

impl<F> Translator for F
where
    F: Fn(&str, &str, &str) -> NoteResult<String> + Send + Sync,
{
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> NoteResult<String> {
        self(text, source_lang, target_lang)
    }
}

/// 根据语言对生成模型名称
pub fn model_name(template: &str, source_lang: &str, target_lang: &str) -> String {
    template
        .replace("{source}", source_lang)
        .replace("{target}", target_lang)
}

/// HTTP 翻译客户端配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslatorConfig {
    pub api_url: String,
    pub model_template: String,
    pub request_timeout_secs: u64,
}

impl Default for TranslatorConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            model_template: DEFAULT_MODEL_TEMPLATE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source_lang: String,
    target_lang: String,
    model: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    code: Option<u16>,
    data: Option<String>,
    message: Option<String>,
}

/// 通过 HTTP 调用翻译服务
///
/// 请求在创建时所在的 tokio 运行时上执行，`translate` 必须在阻塞线程
/// （例如 `spawn_blocking`）中调用。
pub struct HttpTranslator {
    client: reqwest::Client,
    handle: Handle,
    config: TranslatorConfig,
}

impl HttpTranslator {
    /// 在当前 tokio 运行时中创建客户端
    pub fn new(config: TranslatorConfig) -> NoteResult<Self> {
        let handle = Handle::try_current()
            .map_err(|e| NoteError::Config(format!("需要在 tokio 运行时中创建翻译客户端: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| NoteError::Config(format!("创建HTTP客户端失败: {}", e)))?;

        Ok(Self {
            client,
            handle,
            config,
        })
    }

    async fn request(&self, text: &str, source_lang: &str, target_lang: &str) -> NoteResult<String> {
        let body = TranslateRequest {
            text,
            source_lang: source_lang.to_uppercase(),
            target_lang: target_lang.to_uppercase(),
            model: model_name(&self.config.model_template, source_lang, target_lang),
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NoteError::TranslationFailed(format!(
                "翻译API返回状态码 {}",
                status
            )));
        }

        let payload: TranslateResponse = response.json().await?;
        parse_response(payload)
    }
}

fn parse_response(payload: TranslateResponse) -> NoteResult<String> {
    if let Some(code) = payload.code {
        if code != 200 {
            return Err(NoteError::TranslationFailed(format!(
                "翻译API返回错误码 {}: {}",
                code,
                payload.message.unwrap_or_default()
            )));
        }
    }

    match payload.data {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(NoteError::TranslationFailed(
            "翻译API返回空结果".to_string(),
        )),
    }
}

impl Translator for HttpTranslator {
    fn translate(&self, text: &str, source_lang: &str, target_lang: &str) -> NoteResult<String> {
        self.handle
            .block_on(self.request(text, source_lang, target_lang))
    }
}
