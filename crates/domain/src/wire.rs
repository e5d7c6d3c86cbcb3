//! 调度服务JSON格式的反序列化辅助
//!
//! 后端用零值时间 `0001-01-01T00:00:00Z` 表示"从未发生"，集合字段可能是 `null`。

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `Option<DateTime<Utc>>`，零值时间、空串和 `null` 都读作 `None`
pub mod nullable_time {
    use super::*;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        let Some(raw) = raw.filter(|s| !s.trim().is_empty()) else {
            return Ok(None);
        };
        let parsed = DateTime::parse_from_rfc3339(raw.trim())
            .map_err(|e| serde::de::Error::custom(format!("invalid timestamp {raw}: {e}")))?
            .with_timezone(&Utc);
        Ok(non_zero(parsed))
    }

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.serialize(serializer)
    }
}

/// 零值时间视为缺失
pub fn non_zero(time: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if time.year() <= 1 {
        None
    } else {
        Some(time)
    }
}

/// `null` 读作类型默认值
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
