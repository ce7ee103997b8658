//! 核心数据模型定义

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 输出语言
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Th,
}

impl Language {
    /// 提示词中使用的语言名称
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Language::En => "ENGLISH",
            Language::Th => "THAI",
        }
    }
}

/// 单项生命体征读数
///
/// 保留操作员输入的原始文本，同时在录入时解析一次数值，
/// 序列化时只输出原始文本。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct VitalReading {
    raw: String,
    value: Option<f64>,
}

impl VitalReading {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let value = raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite());
        Self { raw, value }
    }

    /// 原始输入文本
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// 解析后的数值，无法解析时为None
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

impl From<String> for VitalReading {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for VitalReading {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<VitalReading> for String {
    fn from(reading: VitalReading) -> Self {
        reading.raw
    }
}

impl fmt::Display for VitalReading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// 发热阈值（摄氏度）
pub const FEVER_THRESHOLD_CELSIUS: f64 = 37.5;

/// 生命体征
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalSigns {
    pub heart_rate: VitalReading,
    pub blood_pressure_sys: VitalReading,
    pub blood_pressure_dia: VitalReading,
    pub temperature: VitalReading,
    pub oxygen_saturation: VitalReading,
    pub respiratory_rate: VitalReading,
}

impl VitalSigns {
    /// 未采集生命体征时的占位值
    pub fn unknown() -> Self {
        Self {
            heart_rate: "0".into(),
            blood_pressure_sys: "0".into(),
            blood_pressure_dia: "0".into(),
            temperature: "0".into(),
            oxygen_saturation: "0".into(),
            respiratory_rate: "0".into(),
        }
    }

    /// 体温是否超过发热阈值
    pub fn has_fever(&self) -> bool {
        self.temperature
            .value()
            .map(|t| t > FEVER_THRESHOLD_CELSIUS)
            .unwrap_or(false)
    }
}

/// 提交来源
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionSource {
    MobileApp,
    Wearable,
    WalkIn,
    Sos,
}

impl SubmissionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobileApp => "mobile_app",
            Self::Wearable => "wearable",
            Self::WalkIn => "walk_in",
            Self::Sos => "sos",
        }
    }
}

impl fmt::Display for SubmissionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 患者状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PatientStatus {
    Pending,  // 待分诊
    Triaged,  // 已分诊
    Admitted, // 已收治
}

impl PatientStatus {
    /// 列表排序用的状态序号
    pub fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Triaged => 1,
            Self::Admitted => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Triaged => "triaged",
            Self::Admitted => "admitted",
        }
    }

    /// 获取所有可能的状态
    pub fn all() -> [PatientStatus; 3] {
        [Self::Pending, Self::Triaged, Self::Admitted]
    }
}

impl fmt::Display for PatientStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 地理位置
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
}

/// 患者自述的分诊信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientIntake {
    pub name: String,
    pub age: String,
    pub gender: String,
    pub symptoms: String,
    pub medical_history: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_specialist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emergency_contact_phone: Option<String>,
    pub vitals: VitalSigns,
    pub submission_source: SubmissionSource,
    #[serde(default)]
    pub request_teleconsult: bool,
}

/// ESI等级下限（最紧急）
pub const ESI_MIN: u8 = 1;
/// ESI等级上限（最不紧急）
pub const ESI_MAX: u8 = 5;
/// 置信度上限
pub const CONFIDENCE_MAX: u8 = 100;

/// AI分析失败时写入风险因素的标记
pub const ANALYSIS_FAILURE_MARKER: &str = "AI Analysis Failure";

/// AI分诊分析结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiAnalysisResult {
    pub esi_level: u8,
    pub esi_description: String,
    pub esi_reasoning: String,
    pub summary: String,
    pub recommended_action: String,
    pub specialist_required: String,
    pub risk_factors: Vec<String>,
    pub infection_risk: bool,
    pub infection_protocol: String,
    pub confidence_score: u8,
}

impl AiAnalysisResult {
    /// 推理服务不可用时的确定性兜底结果：按中度紧急处理并要求人工复核
    pub fn fallback() -> Self {
        Self {
            esi_level: 3,
            esi_description: "Analysis Failed - Treat as Urgent".to_string(),
            esi_reasoning: "AI analysis unavailable. Manual triage required.".to_string(),
            summary: "AI Service unavailable. Manual triage required.".to_string(),
            recommended_action: "Perform manual assessment immediately.".to_string(),
            specialist_required: "General ER Physician".to_string(),
            risk_factors: vec![ANALYSIS_FAILURE_MARKER.to_string()],
            infection_risk: false,
            infection_protocol: "Standard Precautions".to_string(),
            confidence_score: 0,
        }
    }

    /// SOS求救时本地生成的最坏情况假设
    pub fn sos_default() -> Self {
        Self {
            esi_level: 1,
            esi_description: "Resuscitation/Emergent".to_string(),
            esi_reasoning: "SOS Button Activated. High Priority Assumption.".to_string(),
            summary: "Patient activated SOS beacon with visual evidence.".to_string(),
            recommended_action: "Dispatch Ambulance Immediately".to_string(),
            specialist_required: "Emergency Physician".to_string(),
            risk_factors: vec!["Unresponsive".to_string(), "Trauma".to_string()],
            infection_risk: false,
            infection_protocol: "Standard".to_string(),
            confidence_score: 100,
        }
    }

    /// 是否为兜底结果（需人工复核）
    pub fn requires_manual_review(&self) -> bool {
        self.confidence_score == 0
            && self.risk_factors.iter().any(|r| r == ANALYSIS_FAILURE_MARKER)
    }

    /// 校验取值范围
    pub fn validate(&self) -> Result<()> {
        if !(ESI_MIN..=ESI_MAX).contains(&self.esi_level) {
            return Err(TriageError::Validation(format!(
                "ESI level {} out of range {}-{}",
                self.esi_level, ESI_MIN, ESI_MAX
            )));
        }
        if self.confidence_score > CONFIDENCE_MAX {
            return Err(TriageError::Validation(format!(
                "Confidence score {} exceeds {}",
                self.confidence_score, CONFIDENCE_MAX
            )));
        }
        Ok(())
    }

    /// 应用医护人员的人工修正，不会重新调用推理服务
    pub fn apply_override(&self, changes: &AnalysisOverride) -> Result<Self> {
        let mut result = self.clone();
        if let Some(level) = changes.esi_level {
            result.esi_level = level;
        }
        if let Some(description) = &changes.esi_description {
            result.esi_description = description.clone();
        }
        if let Some(action) = &changes.recommended_action {
            result.recommended_action = action.clone();
        }
        if let Some(specialist) = &changes.specialist_required {
            result.specialist_required = specialist.clone();
        }
        if let Some(risk) = changes.infection_risk {
            result.infection_risk = risk;
        }
        if let Some(protocol) = &changes.infection_protocol {
            result.infection_protocol = protocol.clone();
        }
        result.validate()?;
        Ok(result)
    }
}

/// 人工复核修正项
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisOverride {
    #[serde(default)]
    pub esi_level: Option<u8>,
    #[serde(default)]
    pub esi_description: Option<String>,
    #[serde(default)]
    pub recommended_action: Option<String>,
    #[serde(default)]
    pub specialist_required: Option<String>,
    #[serde(default)]
    pub infection_risk: Option<bool>,
    #[serde(default)]
    pub infection_protocol: Option<String>,
}

/// 发音指南条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationEntry {
    pub term: String,
    pub pronunciation: String,
}
