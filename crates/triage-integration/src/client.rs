//! 分诊服务客户端
//!
//! 将患者分诊信息转换为结构化的严重程度评估。推理服务被视为不可信的外部依赖：
//! 任何失败（网络、超时、缺少凭据、响应格式错误）都不会抛给调用方，
//! 分诊评估降级为"中度紧急、需人工复核"的确定性结果。

use crate::prompts;
use crate::reasoning::{GenerationRequest, ReasoningBackend};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};
use triage_core::{
    AiAnalysisResult, Language, PatientIntake, PronunciationEntry, Result, TriageError,
};
use triage_workflow::TriageAssessor;

/// 少于该字符数的输入不调用推理服务
const MIN_INPUT_CHARS: usize = 3;

/// 客户端调用策略
#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// 单次请求超时
    pub timeout: Duration,
    /// 失败后的额外重试次数
    pub max_retries: u32,
    /// 结构化请求的采样温度
    pub temperature: f32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            temperature: 0.2,
        }
    }
}

fn need_more_detail(language: Language) -> &'static str {
    match language {
        Language::En => "Please describe your symptoms in more detail first.",
        Language::Th => "กรุณาระบุอาการของคุณให้ละเอียดกว่านี้",
    }
}

fn empty_question(language: Language) -> &'static str {
    match language {
        Language::En => "Could not generate question.",
        Language::Th => "ไม่สามารถสร้างคำถามได้",
    }
}

fn follow_up_unavailable(language: Language) -> &'static str {
    match language {
        Language::En => "Could not generate a follow-up question at this time.",
        Language::Th => "ไม่สามารถสร้างคำถามติดตามอาการได้ในขณะนี้",
    }
}

/// 去掉首尾空白后按字符计数，纯空白输入视为过短
fn too_short(text: &str) -> bool {
    text.trim().chars().count() < MIN_INPUT_CHARS
}

/// 去掉模型偶尔附带的 ```json 代码块标记
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.trim_start_matches("json");
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// 解析并校验分诊结果
pub fn parse_analysis(text: &str) -> Result<AiAnalysisResult> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(TriageError::MalformedResponse("empty response".to_string()));
    }

    let result: AiAnalysisResult = serde_json::from_str(body)
        .map_err(|e| TriageError::MalformedResponse(e.to_string()))?;
    result
        .validate()
        .map_err(|e| TriageError::MalformedResponse(e.to_string()))?;
    Ok(result)
}

/// 分诊服务客户端
#[derive(Clone)]
pub struct TriageServiceClient {
    backend: Arc<dyn ReasoningBackend>,
    settings: ClientSettings,
}

impl TriageServiceClient {
    pub fn new(backend: Arc<dyn ReasoningBackend>, settings: ClientSettings) -> Self {
        Self { backend, settings }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// 带超时和有限重试的单次调用
    async fn call(&self, request: &GenerationRequest) -> Result<String> {
        let attempts = self.settings.max_retries + 1;
        let mut last_error = None;

        for attempt in 1..=attempts {
            match tokio::time::timeout(self.settings.timeout, self.backend.generate(request)).await
            {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    warn!(
                        "Reasoning request via {} failed (attempt {}/{}): {}",
                        self.backend.name(),
                        attempt,
                        attempts,
                        e
                    );
                    // 缺少凭据时重试没有意义
                    let fatal = matches!(e, TriageError::Config(_));
                    last_error = Some(e);
                    if fatal {
                        break;
                    }
                }
                Err(_) => {
                    warn!(
                        "Reasoning request via {} timed out after {:?} (attempt {}/{})",
                        self.backend.name(),
                        self.settings.timeout,
                        attempt,
                        attempts
                    );
                    last_error = Some(TriageError::Upstream(format!(
                        "timed out after {:?}",
                        self.settings.timeout
                    )));
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| TriageError::Internal("no reasoning attempt made".to_string())))
    }

    async fn try_assess(
        &self,
        intake: &PatientIntake,
        language: Language,
    ) -> Result<AiAnalysisResult> {
        let request = GenerationRequest::structured(
            prompts::triage_prompt(intake, language),
            prompts::triage_response_schema(),
            self.settings.temperature,
        );
        let text = self.call(&request).await?;
        parse_analysis(&text)
    }

    /// 分诊评估，失败时返回兜底结果
    pub async fn assess_patient(
        &self,
        intake: &PatientIntake,
        language: Language,
    ) -> AiAnalysisResult {
        match self.try_assess(intake, language).await {
            Ok(result) => {
                debug!(
                    "Triage assessment returned ESI {} with confidence {}",
                    result.esi_level, result.confidence_score
                );
                result
            }
            Err(e) => {
                error!("Triage analysis failed, using fallback: {}", e);
                AiAnalysisResult::fallback()
            }
        }
    }

    /// 生成一个追问问题，失败时返回固定提示
    pub async fn follow_up_question(
        &self,
        symptoms: &str,
        age: &str,
        gender: &str,
        language: Language,
    ) -> String {
        if too_short(symptoms) {
            return need_more_detail(language).to_string();
        }

        let request =
            GenerationRequest::text(prompts::follow_up_prompt(symptoms, age, gender, language));
        match self.call(&request).await {
            Ok(text) => {
                let question = text.trim();
                if question.is_empty() {
                    empty_question(language).to_string()
                } else {
                    question.to_string()
                }
            }
            Err(e) => {
                error!("Symptom follow-up failed: {}", e);
                follow_up_unavailable(language).to_string()
            }
        }
    }

    /// 医学术语发音指南，失败时返回空列表
    pub async fn pronunciation_guide(&self, text: &str) -> Vec<PronunciationEntry> {
        if too_short(text) {
            return Vec::new();
        }

        let request = GenerationRequest::structured(
            prompts::pronunciation_prompt(text),
            prompts::pronunciation_schema(),
            self.settings.temperature,
        );

        let result = match self.call(&request).await {
            Ok(body) => serde_json::from_str::<Vec<PronunciationEntry>>(strip_code_fence(&body))
                .map_err(TriageError::from),
            Err(e) => Err(e),
        };

        result.unwrap_or_else(|e| {
            warn!("Pronunciation guide failed: {}", e);
            Vec::new()
        })
    }
}

#[async_trait]
impl TriageAssessor for TriageServiceClient {
    async fn assess_patient(&self, intake: &PatientIntake, language: Language) -> AiAnalysisResult {
        TriageServiceClient::assess_patient(self, intake, language).await
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::reasoning::mock::MockReasoningBackend;
    use triage_core::{SubmissionSource, VitalSigns, ANALYSIS_FAILURE_MARKER};

    pub(crate) const VALID_ANALYSIS: &str = r#"{
        "esiLevel": 2,
        "esiDescription": "Emergent",
        "esiReasoning": "Chest pain with tachycardia suggests ACS.",
        "summary": "Middle-aged male with acute chest pain.",
        "recommendedAction": "ECG within 10 minutes",
        "specialistRequired": "Cardiologist",
        "riskFactors": ["Hypertension", "Tachycardia"],
        "infectionRisk": false,
        "infectionProtocol": "None",
        "confidenceScore": 88
    }"#;

    pub(crate) fn intake() -> PatientIntake {
        PatientIntake {
            name: "Anan".to_string(),
            age: "58".to_string(),
            gender: "Male".to_string(),
            symptoms: "Chest pain for 30 minutes".to_string(),
            medical_history: "Hypertension".to_string(),
            suggested_specialist: Some("Cardiologist".to_string()),
            emergency_contact_name: None,
            emergency_contact_phone: None,
            vitals: VitalSigns {
                heart_rate: "118".into(),
                blood_pressure_sys: "150".into(),
                blood_pressure_dia: "90".into(),
                temperature: "36.8".into(),
                oxygen_saturation: "96".into(),
                respiratory_rate: "20".into(),
            },
            submission_source: SubmissionSource::WalkIn,
            request_teleconsult: false,
        }
    }

    fn client(backend: Arc<MockReasoningBackend>) -> TriageServiceClient {
        TriageServiceClient::new(backend, ClientSettings::default())
    }

    fn assert_fallback(result: &AiAnalysisResult) {
        assert_eq!(result.esi_level, 3);
        assert_eq!(result.confidence_score, 0);
        assert!(!result.infection_risk);
        assert!(result
            .risk_factors
            .iter()
            .any(|r| r == ANALYSIS_FAILURE_MARKER));
    }

    #[tokio::test]
    async fn test_assess_parses_structured_result() {
        let backend = Arc::new(MockReasoningBackend::replying(VALID_ANALYSIS));
        let result = client(backend.clone())
            .assess_patient(&intake(), Language::En)
            .await;

        assert_eq!(result.esi_level, 2);
        assert_eq!(result.confidence_score, 88);
        assert_eq!(result.risk_factors.len(), 2);

        let request = backend.last_request().unwrap();
        assert!(request.response_schema.is_some());
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.prompt.contains("Chest pain for 30 minutes"));
    }

    #[tokio::test]
    async fn test_upstream_failure_falls_back() {
        let backend = Arc::new(MockReasoningBackend::failing());
        let result = client(backend.clone())
            .assess_patient(&intake(), Language::En)
            .await;

        assert_fallback(&result);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back() {
        for reply in ["not json", "{\"esiLevel\": 2}", ""] {
            let backend = Arc::new(MockReasoningBackend::replying(reply));
            let result = client(backend).assess_patient(&intake(), Language::En).await;
            assert_fallback(&result);
        }
    }

    #[tokio::test]
    async fn test_out_of_range_esi_falls_back() {
        let reply = VALID_ANALYSIS.replace("\"esiLevel\": 2", "\"esiLevel\": 7");
        let backend = Arc::new(MockReasoningBackend::replying(reply));
        let result = client(backend).assess_patient(&intake(), Language::En).await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_code_fenced_response_is_accepted() {
        let reply = format!("```json\n{}\n```", VALID_ANALYSIS);
        let backend = Arc::new(MockReasoningBackend::replying(reply));
        let result = client(backend).assess_patient(&intake(), Language::En).await;
        assert_eq!(result.esi_level, 2);
    }

    #[tokio::test]
    async fn test_retries_are_bounded() {
        let settings = ClientSettings {
            max_retries: 2,
            ..Default::default()
        };

        let recovering = Arc::new(MockReasoningBackend::failing_then(2, VALID_ANALYSIS));
        let result = TriageServiceClient::new(recovering.clone(), settings.clone())
            .assess_patient(&intake(), Language::En)
            .await;
        assert_eq!(result.esi_level, 2);
        assert_eq!(recovering.calls(), 3);

        let down = Arc::new(MockReasoningBackend::failing());
        let result = TriageServiceClient::new(down.clone(), settings)
            .assess_patient(&intake(), Language::En)
            .await;
        assert_fallback(&result);
        assert_eq!(down.calls(), 3);
    }

    #[tokio::test]
    async fn test_timeout_resolves_to_fallback() {
        let settings = ClientSettings {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let backend = Arc::new(MockReasoningBackend::slow(
            Duration::from_secs(5),
            VALID_ANALYSIS,
        ));
        let result = TriageServiceClient::new(backend, settings)
            .assess_patient(&intake(), Language::En)
            .await;
        assert_fallback(&result);
    }

    #[tokio::test]
    async fn test_short_symptoms_skip_service() {
        let backend = Arc::new(MockReasoningBackend::replying("Any chest pain?"));
        let client = client(backend.clone());

        let question = client.follow_up_question("ab", "30", "Female", Language::En).await;
        assert_eq!(question, "Please describe your symptoms in more detail first.");

        let question = client.follow_up_question("ab", "30", "Female", Language::Th).await;
        assert_eq!(question, "กรุณาระบุอาการของคุณให้ละเอียดกว่านี้");

        let question = client.follow_up_question("  a   ", "30", "Female", Language::En).await;
        assert_eq!(question, "Please describe your symptoms in more detail first.");
        assert!(client.pronunciation_guide("     ").await.is_empty());
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_follow_up_question() {
        let backend = Arc::new(MockReasoningBackend::replying(
            "  Does the pain spread to your arm or jaw?\n",
        ));
        let question = client(backend.clone())
            .follow_up_question("chest pain", "58", "Male", Language::En)
            .await;

        assert_eq!(question, "Does the pain spread to your arm or jaw?");
        assert!(backend.last_request().unwrap().response_schema.is_none());

        let failing = Arc::new(MockReasoningBackend::failing());
        let question = client(failing)
            .follow_up_question("chest pain", "58", "Male", Language::En)
            .await;
        assert_eq!(question, "Could not generate a follow-up question at this time.");
    }

    #[tokio::test]
    async fn test_pronunciation_guide() {
        let backend = Arc::new(MockReasoningBackend::replying(
            r#"[{"term": "Metoprolol", "pronunciation": "meh-TOE-proh-lol"}]"#,
        ));
        let client = client(backend.clone());

        assert!(client.pronunciation_guide("ab").await.is_empty());
        assert_eq!(backend.calls(), 0);

        let guide = client.pronunciation_guide("Take metoprolol daily").await;
        assert_eq!(guide.len(), 1);
        assert_eq!(guide[0].term, "Metoprolol");

        let broken = Arc::new(MockReasoningBackend::replying("{oops"));
        assert!(TriageServiceClient::new(broken, ClientSettings::default())
            .pronunciation_guide("Take metoprolol daily")
            .await
            .is_empty());
    }
}
