//! # 分诊管理模块
//!
//! 提供服务配置的加载、校验和导出

pub mod config;

pub use config::{
    ConfigManager, ConfigValidator, LoggingConfig, ReasoningConfig, ServerConfig, TriageConfig,
};
