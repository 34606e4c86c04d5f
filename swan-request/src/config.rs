use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::backend::{ExecutorRegistry, HttpExecutor, REQWEST_BACKEND, ReqwestExecutor};
use crate::converter::{JsonConverter, SerdeJsonConverter};
use crate::error::{Result, SwanError};
use crate::filter::{Filter, FilterRegistry};
use crate::interceptor::{Interceptor, InterceptorCache, InterceptorFactory};
use crate::parsing::VariableScope;
use crate::types::args::value_to_text;
use crate::types::request::RequestDescriptor;
use crate::types::retry::{BACKOFF_RETRYER, BackOffRetryer, NONE_RETRYER, NoneRetryer, Retryer, RetryerFactory};

/// 默认字符集
pub const DEFAULT_CHARSET: &str = "UTF-8";

/// 全局标量配置
///
/// 可以从任意 serde 数据源反序列化，缺省字段取默认值。
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ConfigSettings {
    /// 请求超时（毫秒），`None` 表示不设置
    #[serde(default = "default_timeout")]
    pub timeout: Option<u64>,

    /// 连接超时（毫秒）
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: Option<u64>,

    #[serde(default = "default_charset")]
    pub charset: String,

    /// 全局内容类型，方法和接口都未声明时使用
    #[serde(default)]
    pub content_type: Option<String>,

    #[serde(default)]
    pub content_encoding: Option<String>,

    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_retry_count")]
    pub retry_count: Option<u32>,

    /// 最大重试间隔（毫秒）
    #[serde(default = "default_max_retry_interval")]
    pub max_retry_interval: Option<u64>,

    /// 重试器标识
    #[serde(default = "default_retryer")]
    pub retryer: Option<String>,

    #[serde(default = "default_true")]
    pub log_enabled: bool,

    /// 执行器名称
    #[serde(default = "default_backend")]
    pub backend: String,

    /// 全局变量，模板中的引用在方法变量之后查找
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// 全局默认参数，仅在请求中不存在同名参数时添加
    #[serde(default)]
    pub default_parameters: Vec<(String, String)>,

    /// 全局默认请求头，仅在请求中不存在同名头时添加
    #[serde(default)]
    pub default_headers: Vec<(String, String)>,

    /// 全局拦截器标识，按顺序排在接口和方法拦截器之前
    #[serde(default)]
    pub interceptors: Vec<String>,
}

fn default_timeout() -> Option<u64> {
    Some(3000)
}

fn default_connect_timeout() -> Option<u64> {
    Some(2000)
}

fn default_charset() -> String {
    DEFAULT_CHARSET.to_string()
}

fn default_retry_count() -> Option<u32> {
    Some(0)
}

fn default_max_retry_interval() -> Option<u64> {
    Some(0)
}

fn default_retryer() -> Option<String> {
    Some(BACKOFF_RETRYER.to_string())
}

fn default_true() -> bool {
    true
}

fn default_backend() -> String {
    REQWEST_BACKEND.to_string()
}

impl Default for ConfigSettings {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            connect_timeout: default_connect_timeout(),
            charset: default_charset(),
            content_type: None,
            content_encoding: None,
            user_agent: None,
            retry_count: default_retry_count(),
            max_retry_interval: default_max_retry_interval(),
            retryer: default_retryer(),
            log_enabled: true,
            backend: default_backend(),
            variables: HashMap::new(),
            default_parameters: Vec::new(),
            default_headers: Vec::new(),
            interceptors: Vec::new(),
        }
    }
}

/// SSL 证书库（PKCS#12）
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SslKeyStore {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub password: Option<String>,
}

impl SslKeyStore {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, password: Option<String>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            password,
        }
    }
}

/// 全局配置
///
/// 三级配置中的最低一级，同时持有过滤器、拦截器、重试器、证书库和执行器注册表。
/// 构建完成后只读，可在线程间共享。
pub struct Configuration {
    settings: ConfigSettings,
    filters: FilterRegistry,
    interceptors: InterceptorCache,
    retryers: HashMap<String, RetryerFactory>,
    key_stores: HashMap<String, Arc<SslKeyStore>>,
    executors: ExecutorRegistry,
    converter: Arc<dyn JsonConverter>,
}

impl Configuration {
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    pub fn settings(&self) -> &ConfigSettings {
        &self.settings
    }

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn interceptors(&self) -> &InterceptorCache {
        &self.interceptors
    }

    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    pub fn json_converter(&self) -> &dyn JsonConverter {
        self.converter.as_ref()
    }

    pub fn has_retryer(&self, id: &str) -> bool {
        self.retryers.contains_key(id)
    }

    pub fn retryer_factory(&self, id: &str) -> Result<&RetryerFactory> {
        self.retryers
            .get(id)
            .ok_or_else(|| SwanError::config(format!("retryer \"{}\" is not registered", id)))
    }

    pub fn key_store(&self, id: &str) -> Result<Arc<SslKeyStore>> {
        self.key_stores
            .get(id)
            .cloned()
            .ok_or_else(|| SwanError::config(format!("ssl key store \"{}\" is not registered", id)))
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.settings.variables.get(name)
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.settings.variables.contains_key(name)
    }
}

impl VariableScope for Configuration {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self.variable(name).and_then(value_to_text))
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("settings", &self.settings)
            .field("retryers", &self.retryers.keys().collect::<Vec<_>>())
            .field("key_stores", &self.key_stores.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// 全局配置构建器
pub struct ConfigurationBuilder {
    settings: ConfigSettings,
    filters: FilterRegistry,
    interceptors: InterceptorCache,
    retryers: HashMap<String, RetryerFactory>,
    key_stores: HashMap<String, Arc<SslKeyStore>>,
    executors: ExecutorRegistry,
    converter: Arc<dyn JsonConverter>,
}

impl Default for ConfigurationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigurationBuilder {
    pub fn new() -> Self {
        let mut retryers: HashMap<String, RetryerFactory> = HashMap::new();
        retryers.insert(
            BACKOFF_RETRYER.to_string(),
            Arc::new(|request: &RequestDescriptor| {
                Arc::new(BackOffRetryer::new(request)) as Arc<dyn Retryer>
            }),
        );
        retryers.insert(
            NONE_RETRYER.to_string(),
            Arc::new(|_: &RequestDescriptor| Arc::new(NoneRetryer) as Arc<dyn Retryer>),
        );
        Self {
            settings: ConfigSettings::default(),
            filters: FilterRegistry::new(),
            interceptors: InterceptorCache::new(),
            retryers,
            key_stores: HashMap::new(),
            executors: ExecutorRegistry::new(),
            converter: Arc::new(SerdeJsonConverter),
        }
    }

    /// 用反序列化得到的设置替换全部标量配置
    pub fn settings(mut self, settings: ConfigSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.settings.timeout = Some(timeout_ms);
        self
    }

    /// 不设置全局超时，由执行器决定
    pub fn without_timeout(mut self) -> Self {
        self.settings.timeout = None;
        self
    }

    pub fn connect_timeout(mut self, timeout_ms: u64) -> Self {
        self.settings.connect_timeout = Some(timeout_ms);
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.settings.charset = charset.into();
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.settings.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.settings.content_encoding = Some(encoding.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.settings.user_agent = Some(user_agent.into());
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.settings.retry_count = Some(count);
        self
    }

    pub fn max_retry_interval(mut self, interval_ms: u64) -> Self {
        self.settings.max_retry_interval = Some(interval_ms);
        self
    }

    pub fn retryer(mut self, id: impl Into<String>) -> Self {
        self.settings.retryer = Some(id.into());
        self
    }

    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.settings.log_enabled = enabled;
        self
    }

    pub fn backend(mut self, name: impl Into<String>) -> Self {
        self.settings.backend = name.into();
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.settings.variables.insert(name.into(), value.into());
        self
    }

    pub fn default_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings
            .default_parameters
            .push((name.into(), value.into()));
        self
    }

    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.default_headers.push((name.into(), value.into()));
        self
    }

    /// 追加一个全局拦截器
    pub fn interceptor(mut self, id: impl Into<String>) -> Self {
        self.settings.interceptors.push(id.into());
        self
    }

    pub fn json_converter(mut self, converter: Arc<dyn JsonConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn register_filter(mut self, name: impl Into<String>, filter: Arc<dyn Filter>) -> Result<Self> {
        self.filters.register(name, filter)?;
        Ok(self)
    }

    pub fn register_interceptor(mut self, id: impl Into<String>, factory: InterceptorFactory) -> Result<Self> {
        self.interceptors.register(id, factory)?;
        Ok(self)
    }

    pub fn register_interceptor_default<T>(mut self, id: impl Into<String>) -> Result<Self>
    where
        T: Interceptor + Default + 'static,
    {
        self.interceptors.register_default::<T>(id)?;
        Ok(self)
    }

    pub fn register_interceptor_instance(
        mut self,
        id: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<Self> {
        self.interceptors.register_instance(id, interceptor)?;
        Ok(self)
    }

    pub fn register_retryer(mut self, id: impl Into<String>, factory: RetryerFactory) -> Result<Self> {
        let id = id.into();
        if self.retryers.contains_key(&id) {
            return Err(SwanError::config(format!(
                "retryer \"{}\" is already registered",
                id
            )));
        }
        self.retryers.insert(id, factory);
        Ok(self)
    }

    pub fn register_key_store(mut self, key_store: SslKeyStore) -> Result<Self> {
        if self.key_stores.contains_key(&key_store.id) {
            return Err(SwanError::config(format!(
                "ssl key store \"{}\" is already registered",
                key_store.id
            )));
        }
        self.key_stores
            .insert(key_store.id.clone(), Arc::new(key_store));
        Ok(self)
    }

    pub fn register_executor(mut self, name: impl Into<String>, executor: Arc<dyn HttpExecutor>) -> Result<Self> {
        self.executors.register(name, executor)?;
        Ok(self)
    }

    /// 构建全局配置
    ///
    /// 未注册 `reqwest` 后端时自动注册；校验全局拦截器、重试器和后端是否存在。
    pub fn build(mut self) -> Result<Configuration> {
        if !self.executors.contains(REQWEST_BACKEND) {
            let executor = ReqwestExecutor::new(self.settings.connect_timeout);
            self.executors.register(REQWEST_BACKEND, Arc::new(executor))?;
        }
        for id in &self.settings.interceptors {
            if !self.interceptors.contains(id) {
                return Err(SwanError::config(format!(
                    "global interceptor \"{}\" is not registered",
                    id
                )));
            }
        }
        if let Some(retryer) = &self.settings.retryer {
            if !retryer.trim().is_empty() && !self.retryers.contains_key(retryer) {
                return Err(SwanError::config(format!(
                    "retryer \"{}\" is not registered",
                    retryer
                )));
            }
        }
        if !self.executors.contains(&self.settings.backend) {
            return Err(SwanError::config(format!(
                "backend \"{}\" is not registered",
                self.settings.backend
            )));
        }
        if self.settings.charset.trim().is_empty() {
            self.settings.charset = DEFAULT_CHARSET.to_string();
        }

        Ok(Configuration {
            settings: self.settings,
            filters: self.filters,
            interceptors: self.interceptors,
            retryers: self.retryers,
            key_stores: self.key_stores,
            executors: self.executors,
            converter: self.converter,
        })
    }
}
