//! # 分诊工作流模块
//!
//! 提供患者分诊生命周期管理功能，包括：
//! - 患者记录：创建、状态变更、远程会诊申请、重新评估
//! - 历史日志：只追加的审计轨迹
//! - 分诊名册：排序、过滤和统计视图
//! - 报表导出：固定列的展平行
//! - 分诊引擎：协调评估服务与名册

pub mod engine;
pub mod export;
pub mod history;
pub mod record;
pub mod roster;

// 重新导出主要类型
pub use engine::{IntakeSubmission, TriageAssessor, TriageEngine};
pub use export::{export_flat, ExportRow, EXPORT_COLUMNS};
pub use history::{EventActor, HistoryEventKind, HistoryEventType, StatusTransition, TriageHistoryEvent};
pub use record::{PatientRecord, SosSubmission};
pub use roster::{
    compute_stats, sorted_view, InMemoryRoster, RosterFilter, RosterStats, RosterStore,
};
