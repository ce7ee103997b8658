//! 分诊名册
//!
//! 持有所有患者记录，提供排序、过滤和统计视图。
//! 记录之间相互独立，写操作只需串行化到单条记录。

use crate::record::PatientRecord;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use triage_core::{AiAnalysisResult, PatientStatus, Result, TriageError, ESI_MIN};
use uuid::Uuid;

/// 名册存储接口
#[async_trait]
pub trait RosterStore: Send + Sync {
    /// 加入新记录
    async fn add(&self, record: PatientRecord) -> Result<Uuid>;

    /// 获取记录快照
    async fn get(&self, id: Uuid) -> Result<PatientRecord>;

    /// 所有记录，最近加入的在前
    async fn list(&self) -> Vec<PatientRecord>;

    /// 变更状态，状态与审计事件同时写入
    async fn update_status(&self, id: Uuid, status: PatientStatus) -> Result<PatientRecord>;

    /// 申请远程会诊
    async fn request_teleconsult(&self, id: Uuid) -> Result<PatientRecord>;

    /// 写入重新评估结果
    async fn apply_reassessment(&self, id: Uuid, analysis: AiAnalysisResult)
        -> Result<PatientRecord>;
}

#[derive(Debug, Default)]
struct RosterInner {
    records: HashMap<Uuid, Arc<Mutex<PatientRecord>>>,
    insertion_order: Vec<Uuid>,
}

/// 进程内名册
#[derive(Debug, Default)]
pub struct InMemoryRoster {
    inner: RwLock<RosterInner>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, id: Uuid) -> Result<Arc<Mutex<PatientRecord>>> {
        let inner = self.inner.read().await;
        inner
            .records
            .get(&id)
            .cloned()
            .ok_or_else(|| TriageError::NotFound(format!("Patient record {} not found", id)))
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RosterStore for InMemoryRoster {
    async fn add(&self, record: PatientRecord) -> Result<Uuid> {
        let id = record.id();
        let mut inner = self.inner.write().await;
        if inner.records.contains_key(&id) {
            return Err(TriageError::Validation(format!(
                "Patient record {} already exists",
                id
            )));
        }
        inner.records.insert(id, Arc::new(Mutex::new(record)));
        inner.insertion_order.push(id);

        tracing::info!("Added patient record {} to roster", id);
        Ok(id)
    }

    async fn get(&self, id: Uuid) -> Result<PatientRecord> {
        let entry = self.entry(id).await?;
        let record = entry.lock().await;
        Ok(record.clone())
    }

    async fn list(&self) -> Vec<PatientRecord> {
        let entries: Vec<Arc<Mutex<PatientRecord>>> = {
            let inner = self.inner.read().await;
            inner
                .insertion_order
                .iter()
                .rev()
                .filter_map(|id| inner.records.get(id).cloned())
                .collect()
        };

        let mut records = Vec::with_capacity(entries.len());
        for entry in entries {
            records.push(entry.lock().await.clone());
        }
        records
    }

    async fn update_status(&self, id: Uuid, status: PatientStatus) -> Result<PatientRecord> {
        let entry = self.entry(id).await?;
        let mut record = entry.lock().await;
        let old_status = record.status();
        record.change_status(status);

        tracing::info!(
            "Updated patient {} status from {} to {}",
            id,
            old_status,
            status
        );
        Ok(record.clone())
    }

    async fn request_teleconsult(&self, id: Uuid) -> Result<PatientRecord> {
        let entry = self.entry(id).await?;
        let mut record = entry.lock().await;
        if record.request_teleconsult() {
            tracing::info!("Teleconsult requested for patient {}", id);
        } else {
            tracing::debug!("Teleconsult already requested for patient {}", id);
        }
        Ok(record.clone())
    }

    async fn apply_reassessment(
        &self,
        id: Uuid,
        analysis: AiAnalysisResult,
    ) -> Result<PatientRecord> {
        let entry = self.entry(id).await?;
        let mut record = entry.lock().await;
        if record.apply_reassessment(analysis) {
            tracing::info!("Patient {} reassessed at ESI {}", id, record.effective_esi());
        } else {
            tracing::warn!(
                "Reassessment of patient {} fell back, keeping ESI {} for manual review",
                id,
                record.effective_esi()
            );
        }
        Ok(record.clone())
    }
}

/// 名册过滤器
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterFilter {
    #[serde(default)]
    pub teleconsult_only: bool,
    #[serde(default)]
    pub status: Option<PatientStatus>,
}

impl RosterFilter {
    pub fn teleconsult_only() -> Self {
        Self {
            teleconsult_only: true,
            ..Default::default()
        }
    }

    fn matches(&self, record: &PatientRecord) -> bool {
        if self.teleconsult_only && !record.teleconsult_requested() {
            return false;
        }
        if let Some(status) = self.status {
            if record.status() != status {
                return false;
            }
        }
        true
    }
}

/// 按展示顺序排列：状态（待分诊优先）、ESI等级升序、创建时间由新到旧
pub fn sorted_view(records: &[PatientRecord], filter: &RosterFilter) -> Vec<PatientRecord> {
    let mut items: Vec<&PatientRecord> = records.iter().filter(|r| filter.matches(r)).collect();

    items.sort_by(|a, b| {
        a.status()
            .rank()
            .cmp(&b.status().rank())
            .then_with(|| a.effective_esi().cmp(&b.effective_esi()))
            .then_with(|| b.timestamp().cmp(&a.timestamp()))
    });

    items.into_iter().cloned().collect()
}

/// 名册统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStats {
    pub total_records: usize,
    pub pending: usize,
    pub triaged: usize,
    pub admitted: usize,
    pub teleconsult_requests: usize,
    /// 尚未收治的ESI-1患者
    pub critical_unadmitted: usize,
    /// AI分析失败、需人工复核的记录
    pub manual_review_required: usize,
}

pub fn compute_stats(records: &[PatientRecord]) -> RosterStats {
    let mut stats = RosterStats {
        total_records: records.len(),
        ..Default::default()
    };

    for record in records {
        match record.status() {
            PatientStatus::Pending => stats.pending += 1,
            PatientStatus::Triaged => stats.triaged += 1,
            PatientStatus::Admitted => stats.admitted += 1,
        }

        if record.teleconsult_requested() {
            stats.teleconsult_requests += 1;
        }

        if let Some(analysis) = record.ai_analysis() {
            if analysis.esi_level == ESI_MIN && record.status() != PatientStatus::Admitted {
                stats.critical_unadmitted += 1;
            }
            if analysis.requires_manual_review() {
                stats.manual_review_required += 1;
            }
        }
    }

    stats
}
