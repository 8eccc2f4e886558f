use chrono::{SecondsFormat, Utc};
use serde_json::Value;

/// 生成客户端关联 ID（毫秒时间戳字符串）
///
/// 与各端生成规则保持一致，便于服务端回显匹配
pub fn generate_temp_id() -> String {
    format!("{}", Utc::now().timestamp_millis())
}

/// 当前时间的 ISO-8601 字符串（毫秒精度，UTC）
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 归一化消息 metadata
///
/// metadata 在线上可能是 JSON 字符串，也可能已经是结构化对象；
/// 解析失败时降级为空对象，保证单条脏数据不影响整个会话的渲染。
pub fn normalize_metadata(raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(Value::String(s)) => {
            serde_json::from_str::<Value>(s).unwrap_or_else(|_| Value::Object(serde_json::Map::new()))
        }
        Some(other) => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn temp_id_is_numeric_millis() {
        let id = generate_temp_id();
        assert!(id.parse::<i64>().is_ok());
        assert!(id.len() >= 13);
    }

    #[test]
    fn normalize_passes_through_objects() {
        let raw = json!({ "url": "http://x/y.png" });
        assert_eq!(normalize_metadata(Some(&raw)), raw);
    }

    #[test]
    fn normalize_parses_string_encoded_json() {
        let raw = json!("{\"url\":\"http://x/y.png\"}");
        assert_eq!(normalize_metadata(Some(&raw))["url"], "http://x/y.png");
    }

    #[test]
    fn normalize_degrades_to_empty_object() {
        // 非法字符串
        let broken = json!("{not json");
        assert_eq!(normalize_metadata(Some(&broken)), json!({}));
        // 缺失
        assert_eq!(normalize_metadata(None), json!({}));
        // null
        assert_eq!(normalize_metadata(Some(&Value::Null)), json!({}));
    }

    #[test]
    fn normalize_is_idempotent() {
        let raw = json!("{\"id\":\"p1\"}");
        let once = normalize_metadata(Some(&raw));
        let twice = normalize_metadata(Some(&once));
        assert_eq!(once, twice);
    }
}
