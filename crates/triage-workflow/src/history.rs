//! 分诊历史日志
//!
//! 每条记录的只追加审计轨迹。事件的附加数据按事件类型静态区分，
//! 序列化后保持 `{timestamp, type, details, actor, meta?}` 的线格式。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use triage_core::{PatientStatus, SubmissionSource};

/// 历史事件类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HistoryEventType {
    Creation,
    StatusChange,
    AiUpdate,
    SosAlert,
}

/// 事件发起者
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventActor {
    System,
    Staff,
    Ai,
}

/// 状态变更
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusTransition {
    pub from: PatientStatus,
    pub to: PatientStatus,
}

/// 按类型区分的事件内容
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEventKind {
    Creation { esi: u8 },
    /// 远程会诊申请也记为状态变更事件，此时没有 `transition`
    StatusChange { transition: Option<StatusTransition> },
    AiUpdate { esi: u8 },
    SosAlert { esi: u8 },
}

impl HistoryEventKind {
    pub fn event_type(&self) -> HistoryEventType {
        match self {
            Self::Creation { .. } => HistoryEventType::Creation,
            Self::StatusChange { .. } => HistoryEventType::StatusChange,
            Self::AiUpdate { .. } => HistoryEventType::AiUpdate,
            Self::SosAlert { .. } => HistoryEventType::SosAlert,
        }
    }

    fn meta(&self) -> Option<EventMeta> {
        match *self {
            Self::Creation { esi } | Self::AiUpdate { esi } | Self::SosAlert { esi } => {
                Some(EventMeta::Esi { esi })
            }
            Self::StatusChange { transition } => transition.map(|t| EventMeta::Transition {
                from: t.from,
                to: t.to,
            }),
        }
    }
}

/// 分诊历史事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "HistoryEventWire", try_from = "HistoryEventWire")]
pub struct TriageHistoryEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: HistoryEventKind,
    pub details: String,
    pub actor: EventActor,
}

impl TriageHistoryEvent {
    /// 常规提交创建记录
    pub fn creation(source: SubmissionSource, esi: u8, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::Creation { esi },
            details: format!(
                "Patient created via {} form. Initial ESI Level: {}",
                source, esi
            ),
            actor: EventActor::System,
        }
    }

    /// SOS求救创建记录
    pub fn sos_alert(esi: u8, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::SosAlert { esi },
            details: format!(
                "SOS Emergency Alert activated. ESI Level {} assigned automatically.",
                esi
            ),
            actor: EventActor::System,
        }
    }

    pub fn status_change(from: PatientStatus, to: PatientStatus, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::StatusChange {
                transition: Some(StatusTransition { from, to }),
            },
            details: format!("Status updated from {} to {}", from, to),
            actor: EventActor::Staff,
        }
    }

    pub fn teleconsult_requested(at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::StatusChange { transition: None },
            details: "Video consultation requested by Admin".to_string(),
            actor: EventActor::Staff,
        }
    }

    pub fn ai_update(esi: u8, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::AiUpdate { esi },
            details: format!("AI reassessment completed. ESI Level: {}", esi),
            actor: EventActor::Ai,
        }
    }

    /// 重新评估失败，保留原有ESI等级
    pub fn ai_update_unavailable(retained_esi: u8, at: DateTime<Utc>) -> Self {
        Self {
            timestamp: at,
            kind: HistoryEventKind::AiUpdate { esi: retained_esi },
            details: format!(
                "AI reassessment unavailable. ESI Level {} retained, manual review required.",
                retained_esi
            ),
            actor: EventActor::System,
        }
    }

    pub fn event_type(&self) -> HistoryEventType {
        self.kind.event_type()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum EventMeta {
    Transition {
        from: PatientStatus,
        to: PatientStatus,
    },
    Esi {
        esi: u8,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HistoryEventWire {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    event_type: HistoryEventType,
    details: String,
    actor: EventActor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    meta: Option<EventMeta>,
}

impl From<TriageHistoryEvent> for HistoryEventWire {
    fn from(event: TriageHistoryEvent) -> Self {
        Self {
            timestamp: event.timestamp,
            event_type: event.kind.event_type(),
            meta: event.kind.meta(),
            details: event.details,
            actor: event.actor,
        }
    }
}

impl TryFrom<HistoryEventWire> for TriageHistoryEvent {
    type Error = String;

    fn try_from(wire: HistoryEventWire) -> Result<Self, Self::Error> {
        let kind = match (wire.event_type, wire.meta) {
            (HistoryEventType::Creation, Some(EventMeta::Esi { esi })) => {
                HistoryEventKind::Creation { esi }
            }
            (HistoryEventType::AiUpdate, Some(EventMeta::Esi { esi })) => {
                HistoryEventKind::AiUpdate { esi }
            }
            (HistoryEventType::SosAlert, Some(EventMeta::Esi { esi })) => {
                HistoryEventKind::SosAlert { esi }
            }
            (HistoryEventType::StatusChange, Some(EventMeta::Transition { from, to })) => {
                HistoryEventKind::StatusChange {
                    transition: Some(StatusTransition { from, to }),
                }
            }
            (HistoryEventType::StatusChange, None) => {
                HistoryEventKind::StatusChange { transition: None }
            }
            (event_type, meta) => {
                return Err(format!(
                    "meta {:?} does not match event type {:?}",
                    meta, event_type
                ))
            }
        };

        Ok(Self {
            timestamp: wire.timestamp,
            kind,
            details: wire.details,
            actor: wire.actor,
        })
    }
}
