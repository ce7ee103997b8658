//! 推理服务后端
//!
//! 外部生成式推理服务的连接器。后端只负责一次请求/响应往返，
//! 超时、重试和兜底由上层的分诊客户端统一处理。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use triage_core::{Result, TriageError};

/// 生成请求
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// 要求结构化JSON输出时的响应结构
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
}

impl GenerationRequest {
    /// 纯文本请求
    pub fn text(prompt: String) -> Self {
        Self {
            prompt,
            response_schema: None,
            temperature: None,
        }
    }

    /// 结构化JSON请求
    pub fn structured(prompt: String, schema: Value, temperature: f32) -> Self {
        Self {
            prompt,
            response_schema: Some(schema),
            temperature: Some(temperature),
        }
    }
}

/// 推理服务后端接口
#[async_trait]
pub trait ReasoningBackend: Send + Sync {
    /// 后端名称
    fn name(&self) -> &str;

    /// 发送请求并返回模型输出的原始文本
    async fn generate(&self, request: &GenerationRequest) -> Result<String>;
}

/// Gemini连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiSettings {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Gemini generateContent 后端
pub struct GeminiBackend {
    settings: GeminiSettings,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GeminiBackend {
    pub fn new(settings: GeminiSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.settings.endpoint.trim_end_matches('/'),
            self.settings.model
        )
    }

    fn build_body(request: &GenerationRequest) -> GenerateContentRequest<'_> {
        let generation_config =
            if request.response_schema.is_some() || request.temperature.is_some() {
                Some(GenerationConfig {
                    response_mime_type: request
                        .response_schema
                        .as_ref()
                        .map(|_| "application/json"),
                    response_schema: request.response_schema.as_ref(),
                    temperature: request.temperature,
                })
            } else {
                None
            };

        GenerateContentRequest {
            contents: vec![RequestContent {
                role: "user",
                parts: vec![RequestPart {
                    text: &request.prompt,
                }],
            }],
            generation_config,
        }
    }

    /// 拼接首个候选结果的文本片段
    fn extract_text(response: GenerateContentResponse) -> Result<String> {
        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect()
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            Err(TriageError::MalformedResponse(
                "No response text from reasoning service".to_string(),
            ))
        } else {
            Ok(text)
        }
    }
}

#[async_trait]
impl ReasoningBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TriageError::Config("Reasoning service API key is missing".to_string()))?;

        let url = self.url();
        debug!("Sending generateContent request to {}", url);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(&Self::build_body(request))
            .send()
            .await
            .map_err(|e| TriageError::Upstream(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TriageError::Upstream(format!(
                "Reasoning service returned status {}",
                status
            )));
        }

        let body: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| TriageError::MalformedResponse(e.to_string()))?;

        Self::extract_text(body)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// 测试用推理后端，返回固定文本或模拟故障
    pub(crate) struct MockReasoningBackend {
        reply: Option<String>,
        failures_before_success: usize,
        delay: Option<Duration>,
        calls: AtomicUsize,
        last_request: Mutex<Option<GenerationRequest>>,
    }

    impl MockReasoningBackend {
        pub(crate) fn replying(text: impl Into<String>) -> Self {
            Self {
                reply: Some(text.into()),
                failures_before_success: 0,
                delay: None,
                calls: AtomicUsize::new(0),
                last_request: Mutex::new(None),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                reply: None,
                ..Self::replying("")
            }
        }

        pub(crate) fn failing_then(failures: usize, text: impl Into<String>) -> Self {
            Self {
                failures_before_success: failures,
                ..Self::replying(text)
            }
        }

        pub(crate) fn slow(delay: Duration, text: impl Into<String>) -> Self {
            Self {
                delay: Some(delay),
                ..Self::replying(text)
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        pub(crate) fn last_request(&self) -> Option<GenerationRequest> {
            self.last_request.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReasoningBackend for MockReasoningBackend {
        fn name(&self) -> &str {
            "mock"
        }

        async fn generate(&self, request: &GenerationRequest) -> Result<String> {
            let attempt = self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_request.lock().unwrap() = Some(request.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            match &self.reply {
                Some(text) if attempt >= self.failures_before_success => Ok(text.clone()),
                _ => Err(TriageError::Upstream("simulated outage".to_string())),
            }
        }
    }
}
