use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::config::Configuration;
use crate::error::{Result, SwanError};

/// 内置 JSON 过滤器名称
pub const JSON_FILTER: &str = "json";

/// 参数过滤器，在参数值参与请求合成之前对其做变换
pub trait Filter: Send + Sync {
    fn apply(&self, config: &Configuration, value: Value) -> anyhow::Result<Value>;
}

impl<F> Filter for F
where
    F: Fn(&Configuration, Value) -> anyhow::Result<Value> + Send + Sync,
{
    fn apply(&self, config: &Configuration, value: Value) -> anyhow::Result<Value> {
        self(config, value)
    }
}

/// 把值编码为 JSON 字符串
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFilter;

impl Filter for JsonFilter {
    fn apply(&self, config: &Configuration, value: Value) -> anyhow::Result<Value> {
        if value.is_null() {
            return Ok(value);
        }
        let text = config.json_converter().encode_to_string(&value)?;
        Ok(Value::String(text))
    }
}

/// 注册期解析好的过滤器规格
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSpec {
    Json,
    Custom(String),
}

impl FilterSpec {
    pub fn name(&self) -> &str {
        match self {
            FilterSpec::Json => JSON_FILTER,
            FilterSpec::Custom(name) => name,
        }
    }
}

/// 固定顺序的过滤器链
#[derive(Clone, Default)]
pub struct FilterChain(Vec<(FilterSpec, Arc<dyn Filter>)>);

impl FilterChain {
    pub fn specs(&self) -> impl Iterator<Item = &FilterSpec> {
        self.0.iter().map(|(spec, _)| spec)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 依次应用链上的过滤器
    pub fn apply(&self, config: &Configuration, value: Value) -> Result<Value> {
        self.0.iter().try_fold(value, |value, (spec, filter)| {
            filter
                .apply(config, value)
                .map_err(|e| SwanError::conversion(format!("filter \"{}\"", spec.name()), e))
        })
    }
}

impl std::fmt::Debug for FilterChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.specs()).finish()
    }
}

/// 全局过滤器注册表，内置 `json`
pub struct FilterRegistry {
    filters: HashMap<String, Arc<dyn Filter>>,
}

impl Default for FilterRegistry {
    fn default() -> Self {
        let mut filters: HashMap<String, Arc<dyn Filter>> = HashMap::new();
        filters.insert(JSON_FILTER.to_string(), Arc::new(JsonFilter));
        Self { filters }
    }
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册过滤器，名称重复时返回配置错误
    pub fn register(&mut self, name: impl Into<String>, filter: Arc<dyn Filter>) -> Result<()> {
        let name = name.into();
        if self.filters.contains_key(&name) {
            return Err(SwanError::config(format!(
                "filter \"{}\" is already registered",
                name
            )));
        }
        log::debug!("registering filter \"{}\"", name);
        self.filters.insert(name, filter);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.filters.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }

    /// 把逗号分隔的过滤器名称解析为过滤器链
    ///
    /// # 参数
    /// * `names` - 例如 `"trim,json"`，空白名称被忽略
    ///
    /// # 返回值
    /// 按声明顺序排列的过滤器链；名称未注册时返回配置错误
    pub fn resolve_chain(&self, names: &str) -> Result<FilterChain> {
        let mut chain = Vec::new();
        for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            let filter = self.filters.get(name).ok_or_else(|| {
                SwanError::config(format!("filter \"{}\" does not exist", name))
            })?;
            let spec = if name == JSON_FILTER {
                FilterSpec::Json
            } else {
                FilterSpec::Custom(name.to_string())
            };
            chain.push((spec, filter.clone()));
        }
        Ok(FilterChain(chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn trim(_: &Configuration, value: Value) -> anyhow::Result<Value> {
        match value {
            Value::String(s) => Ok(Value::String(s.trim().to_string())),
            other => Ok(other),
        }
    }

    #[test]
    fn test_resolve_chain_in_order() {
        let mut registry = FilterRegistry::new();
        registry.register("trim", Arc::new(trim)).unwrap();

        let chain = registry.resolve_chain("trim, json").unwrap();
        assert_eq!(
            chain.specs().cloned().collect::<Vec<_>>(),
            vec![FilterSpec::Custom("trim".to_string()), FilterSpec::Json]
        );

        let config = Configuration::builder().build().unwrap();
        let value = chain.apply(&config, json!("  swan ")).unwrap();
        assert_eq!(value, json!("\"swan\""));
    }

    #[test]
    fn test_unknown_filter_is_configuration_error() {
        let registry = FilterRegistry::new();
        let err = registry.resolve_chain("json,upper").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("upper"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = FilterRegistry::new();
        assert!(registry.register(JSON_FILTER, Arc::new(JsonFilter)).is_err());
    }

    #[test]
    fn test_filter_failure_is_conversion_error() {
        let mut registry = FilterRegistry::new();
        registry
            .register(
                "reject",
                Arc::new(|_: &Configuration, _: Value| -> anyhow::Result<Value> {
                    anyhow::bail!("rejected")
                }),
            )
            .unwrap();
        let chain = registry.resolve_chain("reject").unwrap();
        let config = Configuration::builder().build().unwrap();
        assert!(matches!(
            chain.apply(&config, json!(1)),
            Err(SwanError::Conversion { .. })
        ));
    }
}
