//! # Triage
//!
//! 急诊分诊服务的门面crate，汇总各子模块的主要类型，供演示程序使用。

pub use triage_core as core;
pub use triage_integration as integration;
pub use triage_workflow as workflow;
