//! 分诊引擎
//!
//! 协调分诊评估服务与名册的核心引擎

use crate::export::{export_flat, ExportRow};
use crate::record::{PatientRecord, SosSubmission};
use crate::roster::{compute_stats, sorted_view, RosterFilter, RosterStats, RosterStore};
use async_trait::async_trait;
use std::sync::Arc;
use triage_core::{
    AiAnalysisResult, AnalysisOverride, Language, PatientIntake, PatientStatus, Result,
    SubmissionSource, TriageError,
};
use uuid::Uuid;

/// 分诊评估接口
///
/// 实现方必须始终返回完整的分析结果，失败时自行降级为兜底结果。
#[async_trait]
pub trait TriageAssessor: Send + Sync {
    async fn assess_patient(&self, intake: &PatientIntake, language: Language) -> AiAnalysisResult;
}

/// 新患者提交
#[derive(Debug, Clone)]
pub struct IntakeSubmission {
    pub intake: PatientIntake,
    /// 复核阶段已获得的分析结果，缺省时由引擎调用评估服务
    pub analysis: Option<AiAnalysisResult>,
    pub analysis_override: Option<AnalysisOverride>,
    pub language: Language,
}

impl IntakeSubmission {
    pub fn new(intake: PatientIntake) -> Self {
        Self {
            intake,
            analysis: None,
            analysis_override: None,
            language: Language::default(),
        }
    }
}

/// 分诊引擎
#[derive(Clone)]
pub struct TriageEngine {
    roster: Arc<dyn RosterStore>,
    assessor: Arc<dyn TriageAssessor>,
}

impl TriageEngine {
    /// 创建新的分诊引擎
    pub fn new(roster: Arc<dyn RosterStore>, assessor: Arc<dyn TriageAssessor>) -> Self {
        Self { roster, assessor }
    }

    /// 仅评估，不创建记录（供人工复核）
    pub async fn assess(&self, intake: &PatientIntake, language: Language) -> AiAnalysisResult {
        self.assessor.assess_patient(intake, language).await
    }

    /// 处理新的分诊提交
    ///
    /// SOS来源只能经由 `submit_sos` 建档。
    pub async fn submit_intake(&self, submission: IntakeSubmission) -> Result<PatientRecord> {
        if submission.intake.submission_source == SubmissionSource::Sos {
            return Err(TriageError::Validation(
                "SOS submissions must go through the SOS alert path".to_string(),
            ));
        }

        let analysis = match submission.analysis {
            Some(analysis) => {
                analysis.validate()?;
                analysis
            }
            None => {
                self.assessor
                    .assess_patient(&submission.intake, submission.language)
                    .await
            }
        };

        let analysis = match &submission.analysis_override {
            Some(changes) => {
                tracing::info!("Applying staff override to triage assessment");
                analysis.apply_override(changes)?
            }
            None => analysis,
        };

        if analysis.requires_manual_review() {
            tracing::warn!("Submitting patient with fallback assessment, manual review required");
        }

        let record = PatientRecord::create(submission.intake, analysis);
        self.roster.add(record.clone()).await?;

        tracing::info!(
            "Created patient {} via {} at ESI {}",
            record.id(),
            record.submission_source(),
            record.effective_esi()
        );
        Ok(record)
    }

    /// 处理SOS求救
    pub async fn submit_sos(&self, submission: SosSubmission) -> Result<PatientRecord> {
        let record = PatientRecord::create_sos(submission);
        self.roster.add(record.clone()).await?;

        tracing::warn!("SOS alert received, created patient {} at ESI 1", record.id());
        Ok(record)
    }

    /// 更新患者状态
    pub async fn change_status(&self, id: Uuid, status: PatientStatus) -> Result<PatientRecord> {
        self.roster.update_status(id, status).await
    }

    /// 申请远程会诊
    pub async fn request_teleconsult(&self, id: Uuid) -> Result<PatientRecord> {
        self.roster.request_teleconsult(id).await
    }

    /// 重新评估已有记录
    pub async fn reassess(&self, id: Uuid, language: Language) -> Result<PatientRecord> {
        let intake = self.roster.get(id).await?.to_intake();
        let analysis = self.assessor.assess_patient(&intake, language).await;
        self.roster.apply_reassessment(id, analysis).await
    }

    pub async fn get_patient(&self, id: Uuid) -> Result<PatientRecord> {
        self.roster.get(id).await
    }

    /// 获取排序后的名册视图
    pub async fn sorted_patients(&self, filter: &RosterFilter) -> Vec<PatientRecord> {
        let records = self.roster.list().await;
        sorted_view(&records, filter)
    }

    /// 导出全部记录
    pub async fn export(&self) -> Vec<ExportRow> {
        let records = self.roster.list().await;
        export_flat(&records)
    }

    /// 获取名册统计
    pub async fn stats(&self) -> RosterStats {
        let records = self.roster.list().await;
        compute_stats(&records)
    }

    pub fn roster(&self) -> &Arc<dyn RosterStore> {
        &self.roster
    }
}
