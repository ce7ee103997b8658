//! 患者记录
//!
//! 管理单个患者的分诊生命周期。历史日志只能通过本模块的操作追加，
//! 每次状态变更都与对应的审计事件在同一步内完成。

use crate::history::TriageHistoryEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_core::utils::generate_record_id;
use triage_core::{
    AiAnalysisResult, GeoLocation, PatientIntake, PatientStatus, SubmissionSource, VitalSigns,
    ESI_MAX,
};
use uuid::Uuid;

/// SOS求救提交
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SosSubmission {
    #[serde(default)]
    pub symptoms: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub location: Option<GeoLocation>,
}

const SOS_DEFAULT_SYMPTOMS: &str = "SOS Activation - Immediate Assistance Required";
const UNKNOWN: &str = "Unknown";

/// 对外输出时历史按最新在前排列，与展示顺序一致
fn serialize_newest_first<S>(history: &[TriageHistoryEvent], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(history.iter().rev())
}

/// 患者记录
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientRecord {
    id: Uuid,
    name: String,
    age: String,
    gender: String,
    symptoms: String,
    medical_history: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggested_specialist: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emergency_contact_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    emergency_contact_phone: Option<String>,
    vitals: VitalSigns,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    status: PatientStatus,
    #[serde(serialize_with = "serialize_newest_first")]
    history: Vec<TriageHistoryEvent>,
    submission_source: SubmissionSource,
    request_teleconsult: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<GeoLocation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ai_analysis: Option<AiAnalysisResult>,
}

impl PatientRecord {
    /// 由分诊表单和分析结果创建记录
    pub fn create(intake: PatientIntake, analysis: AiAnalysisResult) -> Self {
        Self::create_at(intake, analysis, Utc::now())
    }

    pub fn create_at(intake: PatientIntake, analysis: AiAnalysisResult, at: DateTime<Utc>) -> Self {
        let first_event = TriageHistoryEvent::creation(intake.submission_source, analysis.esi_level, at);

        Self {
            id: generate_record_id(),
            name: intake.name,
            age: intake.age,
            gender: intake.gender,
            symptoms: intake.symptoms,
            medical_history: intake.medical_history,
            suggested_specialist: intake.suggested_specialist,
            emergency_contact_name: intake.emergency_contact_name,
            emergency_contact_phone: intake.emergency_contact_phone,
            vitals: intake.vitals,
            timestamp: at,
            status: PatientStatus::Pending,
            history: vec![first_event],
            submission_source: intake.submission_source,
            request_teleconsult: intake.request_teleconsult,
            image_url: None,
            location: None,
            ai_analysis: Some(analysis),
        }
    }

    /// 创建SOS求救记录，本地合成ESI-1分析并强制申请远程会诊
    pub fn create_sos(submission: SosSubmission) -> Self {
        Self::create_sos_at(submission, Utc::now())
    }

    pub fn create_sos_at(submission: SosSubmission, at: DateTime<Utc>) -> Self {
        let analysis = AiAnalysisResult::sos_default();
        let symptoms = submission
            .symptoms
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| SOS_DEFAULT_SYMPTOMS.to_string());

        Self {
            id: generate_record_id(),
            name: "Emergency SOS".to_string(),
            age: UNKNOWN.to_string(),
            gender: UNKNOWN.to_string(),
            symptoms,
            medical_history: UNKNOWN.to_string(),
            suggested_specialist: None,
            emergency_contact_name: None,
            emergency_contact_phone: None,
            vitals: VitalSigns::unknown(),
            timestamp: at,
            status: PatientStatus::Pending,
            history: vec![TriageHistoryEvent::sos_alert(analysis.esi_level, at)],
            submission_source: SubmissionSource::Sos,
            request_teleconsult: true,
            image_url: submission.image_url,
            location: submission.location,
            ai_analysis: Some(analysis),
        }
    }

    /// 变更状态并追加审计事件。不限制状态前进方向，便于医护人员纠正。
    pub fn change_status(&mut self, new_status: PatientStatus) {
        self.change_status_at(new_status, Utc::now());
    }

    pub fn change_status_at(&mut self, new_status: PatientStatus, at: DateTime<Utc>) {
        let event = TriageHistoryEvent::status_change(self.status, new_status, at);
        self.history.push(event);
        self.status = new_status;
    }

    /// 申请远程视频会诊，已申请时不做任何改动。返回是否发生变更。
    pub fn request_teleconsult(&mut self) -> bool {
        self.request_teleconsult_at(Utc::now())
    }

    pub fn request_teleconsult_at(&mut self, at: DateTime<Utc>) -> bool {
        if self.request_teleconsult {
            return false;
        }
        self.history.push(TriageHistoryEvent::teleconsult_requested(at));
        self.request_teleconsult = true;
        true
    }

    /// 用新的AI分析结果替换当前分析
    ///
    /// 兜底结果不会覆盖已有分析，只记录一条需人工复核的事件。返回分析是否被替换。
    pub fn apply_reassessment(&mut self, analysis: AiAnalysisResult) -> bool {
        self.apply_reassessment_at(analysis, Utc::now())
    }

    pub fn apply_reassessment_at(&mut self, analysis: AiAnalysisResult, at: DateTime<Utc>) -> bool {
        if analysis.requires_manual_review() {
            if let Some(current) = &self.ai_analysis {
                self.history.push(TriageHistoryEvent::ai_update_unavailable(
                    current.esi_level,
                    at,
                ));
                return false;
            }
        }

        self.history
            .push(TriageHistoryEvent::ai_update(analysis.esi_level, at));
        self.ai_analysis = Some(analysis);
        true
    }

    /// 重新评估时使用的分诊信息
    pub fn to_intake(&self) -> PatientIntake {
        PatientIntake {
            name: self.name.clone(),
            age: self.age.clone(),
            gender: self.gender.clone(),
            symptoms: self.symptoms.clone(),
            medical_history: self.medical_history.clone(),
            suggested_specialist: self.suggested_specialist.clone(),
            emergency_contact_name: self.emergency_contact_name.clone(),
            emergency_contact_phone: self.emergency_contact_phone.clone(),
            vitals: self.vitals.clone(),
            submission_source: self.submission_source,
            request_teleconsult: self.request_teleconsult,
        }
    }

    /// 排序用的ESI等级，缺少分析时按最不紧急处理
    pub fn effective_esi(&self) -> u8 {
        self.ai_analysis
            .as_ref()
            .map(|a| a.esi_level)
            .unwrap_or(ESI_MAX)
    }

    /// 历史事件，按发生时间升序
    pub fn history(&self) -> &[TriageHistoryEvent] {
        &self.history
    }

    /// 历史事件，最新的在前，用于展示
    pub fn history_newest_first(&self) -> impl Iterator<Item = &TriageHistoryEvent> {
        self.history.iter().rev()
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn age(&self) -> &str {
        &self.age
    }

    pub fn gender(&self) -> &str {
        &self.gender
    }

    pub fn symptoms(&self) -> &str {
        &self.symptoms
    }

    pub fn medical_history(&self) -> &str {
        &self.medical_history
    }

    pub fn suggested_specialist(&self) -> Option<&str> {
        self.suggested_specialist.as_deref()
    }

    pub fn emergency_contact(&self) -> (Option<&str>, Option<&str>) {
        (
            self.emergency_contact_name.as_deref(),
            self.emergency_contact_phone.as_deref(),
        )
    }

    pub fn vitals(&self) -> &VitalSigns {
        &self.vitals
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn status(&self) -> PatientStatus {
        self.status
    }

    pub fn submission_source(&self) -> SubmissionSource {
        self.submission_source
    }

    pub fn teleconsult_requested(&self) -> bool {
        self.request_teleconsult
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn location(&self) -> Option<GeoLocation> {
        self.location
    }

    pub fn ai_analysis(&self) -> Option<&AiAnalysisResult> {
        self.ai_analysis.as_ref()
    }

    #[cfg(test)]
    pub(crate) fn clear_analysis_for_test(&mut self) {
        self.ai_analysis = None;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::history::{EventActor, HistoryEventKind, HistoryEventType, StatusTransition};
    use triage_core::utils::from_epoch_millis;

    pub(crate) fn sample_intake() -> PatientIntake {
        PatientIntake {
            name: "Somchai".to_string(),
            age: "54".to_string(),
            gender: "Male".to_string(),
            symptoms: "Crushing chest pain radiating to left arm".to_string(),
            medical_history: "Hypertension".to_string(),
            suggested_specialist: None,
            emergency_contact_name: Some("Nok".to_string()),
            emergency_contact_phone: Some("081-000-0000".to_string()),
            vitals: VitalSigns {
                heart_rate: "112".into(),
                blood_pressure_sys: "160".into(),
                blood_pressure_dia: "95".into(),
                temperature: "36.9".into(),
                oxygen_saturation: "94".into(),
                respiratory_rate: "22".into(),
            },
            submission_source: SubmissionSource::WalkIn,
            request_teleconsult: false,
        }
    }

    pub(crate) fn analysis_with_esi(esi: u8) -> AiAnalysisResult {
        AiAnalysisResult {
            esi_level: esi,
            esi_description: "Emergent".to_string(),
            esi_reasoning: "Possible ACS".to_string(),
            summary: "Chest pain with tachycardia".to_string(),
            recommended_action: "ECG within 10 minutes".to_string(),
            specialist_required: "Cardiologist".to_string(),
            risk_factors: vec!["Hypertension".to_string()],
            infection_risk: false,
            infection_protocol: "None".to_string(),
            confidence_score: 85,
        }
    }

    #[test]
    fn test_create_starts_pending_with_creation_event() {
        let at = from_epoch_millis(100).unwrap();
        let record = PatientRecord::create_at(sample_intake(), analysis_with_esi(2), at);

        assert_eq!(record.status(), PatientStatus::Pending);
        assert_eq!(record.history().len(), 1);

        let first = &record.history()[0];
        assert_eq!(first.event_type(), HistoryEventType::Creation);
        assert_eq!(first.actor, EventActor::System);
        assert_eq!(first.kind, HistoryEventKind::Creation { esi: 2 });
        assert_eq!(
            first.details,
            "Patient created via walk_in form. Initial ESI Level: 2"
        );
        assert_eq!(first.timestamp, record.timestamp());
    }

    #[test]
    fn test_create_sos_assumes_worst_case() {
        let record = PatientRecord::create_sos(SosSubmission {
            symptoms: None,
            image_url: Some("data:image/jpeg;base64,AAAA".to_string()),
            location: Some(GeoLocation { lat: 13.75, lng: 100.5 }),
        });

        assert_eq!(record.status(), PatientStatus::Pending);
        assert!(record.teleconsult_requested());
        assert_eq!(record.submission_source(), SubmissionSource::Sos);
        assert_eq!(record.symptoms(), SOS_DEFAULT_SYMPTOMS);
        assert_eq!(record.age(), "Unknown");
        assert_eq!(record.effective_esi(), 1);
        assert!(record.location().is_some());

        let first = &record.history()[0];
        assert_eq!(first.event_type(), HistoryEventType::SosAlert);
        assert_eq!(first.actor, EventActor::System);
        assert_eq!(first.kind, HistoryEventKind::SosAlert { esi: 1 });
    }

    #[test]
    fn test_change_status_appends_exactly_one_event() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(3));
        let before = record.history().to_vec();

        record.change_status(PatientStatus::Admitted);

        assert_eq!(record.status(), PatientStatus::Admitted);
        assert_eq!(record.history().len(), before.len() + 1);
        assert_eq!(&record.history()[..before.len()], &before[..]);

        let last = record.history().last().unwrap();
        assert_eq!(last.actor, EventActor::Staff);
        assert_eq!(
            last.kind,
            HistoryEventKind::StatusChange {
                transition: Some(StatusTransition {
                    from: PatientStatus::Pending,
                    to: PatientStatus::Admitted,
                })
            }
        );
    }

    #[test]
    fn test_status_can_move_backwards() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(3));
        record.change_status(PatientStatus::Admitted);
        record.change_status(PatientStatus::Triaged);

        assert_eq!(record.status(), PatientStatus::Triaged);
        assert_eq!(record.history().len(), 3);
    }

    #[test]
    fn test_request_teleconsult_is_idempotent() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(4));

        assert!(record.request_teleconsult());
        assert!(!record.request_teleconsult());

        assert!(record.teleconsult_requested());
        assert_eq!(record.history().len(), 2);
        assert_eq!(record.status(), PatientStatus::Pending);
        assert_eq!(
            record.history()[1].details,
            "Video consultation requested by Admin"
        );
    }

    #[test]
    fn test_reassessment_logs_ai_update() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(3));
        record.apply_reassessment(analysis_with_esi(2));

        assert_eq!(record.effective_esi(), 2);
        let last = record.history().last().unwrap();
        assert_eq!(last.actor, EventActor::Ai);
        assert_eq!(last.kind, HistoryEventKind::AiUpdate { esi: 2 });
    }

    #[test]
    fn test_fallback_reassessment_keeps_prior_analysis() {
        let mut record = PatientRecord::create_sos(SosSubmission::default());
        let replaced = record.apply_reassessment(AiAnalysisResult::fallback());

        assert!(!replaced);
        assert_eq!(record.effective_esi(), 1);
        assert_eq!(
            record.ai_analysis().unwrap().esi_description,
            AiAnalysisResult::sos_default().esi_description
        );

        let last = record.history().last().unwrap();
        assert_eq!(last.event_type(), HistoryEventType::AiUpdate);
        assert_eq!(last.actor, EventActor::System);
        assert_eq!(last.kind, HistoryEventKind::AiUpdate { esi: 1 });
        assert!(last.details.contains("manual review"));
    }

    #[test]
    fn test_history_newest_first_reverses_order() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(3));
        record.change_status(PatientStatus::Triaged);

        let newest = record.history_newest_first().next().unwrap();
        assert_eq!(newest.event_type(), HistoryEventType::StatusChange);
    }

    #[test]
    fn test_record_serializes_with_wire_field_names() {
        let record = PatientRecord::create(sample_intake(), analysis_with_esi(2));
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["status"], "pending");
        assert_eq!(json["submissionSource"], "walk_in");
        assert_eq!(json["requestTeleconsult"], false);
        assert_eq!(json["aiAnalysis"]["esiLevel"], 2);
        assert_eq!(json["history"][0]["type"], "CREATION");
        assert!(json["timestamp"].is_i64());
        assert!(json.get("imageUrl").is_none());
    }

    #[test]
    fn test_serialized_history_is_newest_first() {
        let mut record = PatientRecord::create(sample_intake(), analysis_with_esi(2));
        record.change_status(PatientStatus::Triaged);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["history"][0]["type"], "STATUS_CHANGE");
        assert_eq!(json["history"][1]["type"], "CREATION");
    }
}
