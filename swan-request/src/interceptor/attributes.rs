use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::parsing::{Template, VariableScope};

/// 拦截器属性值
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// 每次调用渲染为字符串
    Template(Template),
    Literal(Value),
}

impl AttributeValue {
    pub fn render(&self, scope: &dyn VariableScope) -> Result<Value> {
        match self {
            AttributeValue::Template(template) => Ok(Value::String(template.render(scope)?)),
            AttributeValue::Literal(value) => Ok(value.clone()),
        }
    }
}

/// 一个拦截器在某个作用域上声明的全部属性
#[derive(Debug, Clone, PartialEq)]
pub struct InterceptorAttributes {
    pub interceptor: String,
    pub values: Vec<(String, AttributeValue)>,
}

impl InterceptorAttributes {
    pub fn new(interceptor: impl Into<String>) -> Self {
        Self {
            interceptor: interceptor.into(),
            values: Vec::new(),
        }
    }

    pub fn render(&self, scope: &dyn VariableScope) -> Result<Map<String, Value>> {
        let mut rendered = Map::new();
        for (name, value) in &self.values {
            rendered.insert(name.clone(), value.render(scope)?);
        }
        Ok(rendered)
    }

    pub(crate) fn templates(&self) -> impl Iterator<Item = &Template> {
        self.values.iter().filter_map(|(_, value)| match value {
            AttributeValue::Template(template) => Some(template),
            AttributeValue::Literal(_) => None,
        })
    }
}

/// 请求上的属性包，按拦截器标识分组
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeBag(HashMap<String, Map<String, Value>>);

impl AttributeBag {
    pub fn get(&self, interceptor: &str, name: &str) -> Option<&Value> {
        self.0.get(interceptor).and_then(|values| values.get(name))
    }

    pub fn set(&mut self, interceptor: &str, name: impl Into<String>, value: impl Into<Value>) {
        self.0
            .entry(interceptor.to_string())
            .or_default()
            .insert(name.into(), value.into());
    }

    /// 合并一组属性，后合并的同名属性覆盖先前的值
    pub fn merge(&mut self, interceptor: &str, values: Map<String, Value>) {
        self.0
            .entry(interceptor.to_string())
            .or_default()
            .extend(values);
    }

    pub fn for_interceptor(&self, interceptor: &str) -> Option<&Map<String, Value>> {
        self.0.get(interceptor)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_attributes() {
        let mut attributes = InterceptorAttributes::new("auth");
        attributes.values.push((
            "token".to_string(),
            AttributeValue::Template(Template::parse("Bearer {token}").unwrap()),
        ));
        attributes
            .values
            .push(("retries".to_string(), AttributeValue::Literal(json!(2))));

        let scope: HashMap<String, String> =
            [("token".to_string(), "xyz".to_string())].into_iter().collect();
        let rendered = attributes.render(&scope).unwrap();
        assert_eq!(rendered.get("token"), Some(&json!("Bearer xyz")));
        assert_eq!(rendered.get("retries"), Some(&json!(2)));
        assert_eq!(attributes.templates().count(), 1);
    }

    #[test]
    fn test_bag_merge_overrides() {
        let mut bag = AttributeBag::default();
        bag.set("auth", "scope", "base");
        let mut method_level = Map::new();
        method_level.insert("scope".to_string(), json!("method"));
        bag.merge("auth", method_level);

        assert_eq!(bag.get("auth", "scope"), Some(&json!("method")));
        assert_eq!(bag.for_interceptor("auth").map(Map::len), Some(1));
        assert!(bag.get("log", "scope").is_none());
    }
}
