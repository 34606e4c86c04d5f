use anyhow::{Context, bail};
use serde_json::{Map, Value};

/// JSON 转换器
///
/// 负责 JSON 参数的编码，以及把 bean 参数投影为属性表。
pub trait JsonConverter: Send + Sync {
    fn encode_to_string(&self, value: &Value) -> anyhow::Result<String>;

    /// 对象的属性表，保持属性声明顺序
    fn to_property_map(&self, value: &Value) -> anyhow::Result<Map<String, Value>>;
}

/// 基于 serde_json 的默认转换器
#[derive(Debug, Default, Clone, Copy)]
pub struct SerdeJsonConverter;

impl JsonConverter for SerdeJsonConverter {
    fn encode_to_string(&self, value: &Value) -> anyhow::Result<String> {
        serde_json::to_string(value).context("failed to encode json")
    }

    fn to_property_map(&self, value: &Value) -> anyhow::Result<Map<String, Value>> {
        match value {
            Value::Object(map) => Ok(map.clone()),
            Value::Null => Ok(Map::new()),
            other => bail!("cannot project {} onto properties", kind_of(other)),
        }
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_property_map_keeps_order() {
        let converter = SerdeJsonConverter;
        let map = converter
            .to_property_map(&json!({"name": "swan", "age": 3, "city": null}))
            .unwrap();
        assert_eq!(
            map.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["name", "age", "city"]
        );
        assert!(converter.to_property_map(&Value::Null).unwrap().is_empty());
    }

    #[test]
    fn test_property_map_rejects_scalars() {
        let err = SerdeJsonConverter.to_property_map(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn test_encode_to_string() {
        let text = SerdeJsonConverter
            .encode_to_string(&json!({"b": 1, "a": [true]}))
            .unwrap();
        assert_eq!(text, r#"{"b":1,"a":[true]}"#);
    }
}
