//! 通用工具函数

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

/// 导出报表使用的时间格式
pub const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 生成唯一的患者记录标识
pub fn generate_record_id() -> Uuid {
    Uuid::new_v4()
}

/// 毫秒时间戳转换为UTC时间
pub fn from_epoch_millis(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

/// 按导出格式输出时间
pub fn format_export_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(EXPORT_TIMESTAMP_FORMAT).to_string()
}
