//! 配置管理
//!
//! 从TOML文件和 `TRIAGE_` 前缀的环境变量加载服务配置，并在启动前校验。
//! 嵌套字段用双下划线分隔，例如 `TRIAGE_REASONING__API_KEY`。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info, warn};
use triage_integration::{ClientSettings, GeminiSettings};

/// 未在配置中提供密钥时读取的环境变量
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

const REDACTED: &str = "<redacted>";

/// 分诊服务完整配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 推理服务配置
    pub reasoning: ReasoningConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 启用CORS
    pub enable_cors: bool,
}

/// 推理服务配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningConfig {
    /// 服务端点
    pub endpoint: String,
    /// 模型名称
    pub model: String,
    /// API密钥
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 采样温度
    pub temperature: f32,
    /// 失败后的额外重试次数
    pub max_retries: u32,
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别或EnvFilter表达式
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-3-flash-preview".to_string(),
            api_key: None,
            timeout_secs: 30,
            temperature: 0.2,
            max_retries: 0,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl ReasoningConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key: self.api_key.clone(),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            timeout: Duration::from_secs(self.timeout_secs),
            max_retries: self.max_retries,
            temperature: self.temperature,
        }
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    /// 配置数据
    config: TriageConfig,
    /// 配置文件路径
    config_path: Option<String>,
    /// 配置验证器
    validator: ConfigValidator,
}

impl ConfigManager {
    /// 加载配置：默认值 < 配置文件 < 环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }

        let settings = builder
            .add_source(
                Environment::with_prefix("TRIAGE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let mut config: TriageConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        if !config.reasoning.has_api_key() {
            config.reasoning.api_key = std::env::var(API_KEY_ENV)
                .ok()
                .filter(|k| !k.trim().is_empty());
        }

        match config_path {
            Some(path) => info!("Configuration loaded from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }

        Ok(Self::with_source(config, config_path.map(str::to_string)))
    }

    /// 使用现成的配置创建管理器
    pub fn from_config(config: TriageConfig) -> Self {
        Self::with_source(config, None)
    }

    fn with_source(config: TriageConfig, config_path: Option<String>) -> Self {
        Self {
            config,
            config_path,
            validator: ConfigValidator::new(),
        }
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut TriageConfig {
        &mut self.config
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    /// 验证配置，缺少API密钥只告警不失败
    pub fn validate(&self) -> Result<()> {
        self.validator.validate(&self.config)?;

        if !self.config.reasoning.has_api_key() {
            warn!(
                "No reasoning API key configured; every assessment will use the fallback result"
            );
        }
        Ok(())
    }

    /// 导出为TOML，密钥脱敏
    pub fn to_toml_string(&self) -> Result<String> {
        let mut printable = self.config.clone();
        if printable.reasoning.api_key.is_some() {
            printable.reasoning.api_key = Some(REDACTED.to_string());
        }
        toml::to_string_pretty(&printable).context("Failed to serialize configuration")
    }
}

/// 配置验证器
#[derive(Debug)]
pub struct ConfigValidator {
    /// 验证规则
    validation_rules: Vec<ValidationRule>,
}

/// 验证规则
#[derive(Debug)]
struct ValidationRule {
    /// 字段路径
    field_path: &'static str,
    /// 验证函数
    validator: fn(&TriageConfig) -> Result<()>,
    /// 错误消息
    error_message: &'static str,
}

impl ConfigValidator {
    /// 创建新的配置验证器
    pub fn new() -> Self {
        let validation_rules = vec![
            ValidationRule {
                field_path: "server.port",
                validator: |config| {
                    if config.server.port == 0 {
                        Err(anyhow::anyhow!("Server port cannot be 0"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid server port",
            },
            ValidationRule {
                field_path: "reasoning.timeout_secs",
                validator: |config| {
                    if config.reasoning.timeout_secs == 0 {
                        Err(anyhow::anyhow!("Reasoning timeout must be positive"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid reasoning timeout",
            },
            ValidationRule {
                field_path: "reasoning.temperature",
                validator: |config| {
                    let temperature = config.reasoning.temperature;
                    if (0.0..=2.0).contains(&temperature) {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!(
                            "Temperature {} is outside 0.0..=2.0",
                            temperature
                        ))
                    }
                },
                error_message: "Invalid reasoning temperature",
            },
            ValidationRule {
                field_path: "reasoning.max_retries",
                validator: |config| {
                    if config.reasoning.max_retries > 5 {
                        Err(anyhow::anyhow!("At most 5 retries are allowed"))
                    } else {
                        Ok(())
                    }
                },
                error_message: "Invalid reasoning retry count",
            },
            ValidationRule {
                field_path: "reasoning.endpoint",
                validator: |config| {
                    let endpoint = &config.reasoning.endpoint;
                    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
                        Ok(())
                    } else {
                        Err(anyhow::anyhow!("Endpoint must be an http(s) URL: {}", endpoint))
                    }
                },
                error_message: "Invalid reasoning endpoint",
            },
        ];

        Self { validation_rules }
    }

    /// 验证配置
    pub fn validate(&self, config: &TriageConfig) -> Result<()> {
        for rule in &self.validation_rules {
            if let Err(e) = (rule.validator)(config) {
                error!("Configuration validation failed for {}: {}", rule.field_path, e);
                return Err(anyhow::anyhow!("{}: {}", rule.error_message, e));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
