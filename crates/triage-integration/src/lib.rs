//! # 分诊集成模块
//!
//! 提供与外部系统的集成功能，包括：
//! - 推理服务连接器，封装生成式推理服务的请求/响应往返
//! - 分诊服务客户端，提供超时、重试和确定性兜底
//! - RESTful API接口，向前端和设备网关暴露分诊操作

pub mod api;
pub mod client;
pub mod prompts;
pub mod reasoning;

pub use api::{create_router, ApiError, ApiServer, ApiState};
pub use client::{parse_analysis, ClientSettings, TriageServiceClient};
pub use reasoning::{GeminiBackend, GeminiSettings, GenerationRequest, ReasoningBackend};
