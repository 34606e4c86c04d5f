use std::sync::Arc;

use serde_json::Value;

use crate::config::SslKeyStore;
use crate::interceptor::{AttributeBag, InterceptorEntry};
use crate::types::args::{FileData, OnError, OnProgress, OnSuccess};
use crate::types::http::{DataType, HttpMethod};
use crate::types::retry::{RetryPolicy, Retryer};

/// 查询参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPair {
    pub name: String,
    /// `None` 表示只有名称、没有 `=` 的参数
    pub value: Option<String>,
}

impl QueryPair {
    pub fn new(name: impl Into<String>, value: Option<String>) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// 请求头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// 请求头集合，名称比较忽略大小写，保留首次写入时的大小写和顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers(Vec<Header>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|h| h.name.eq_ignore_ascii_case(name))
            .map(|h| h.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// 设置请求头，已存在时覆盖（后写入者生效）
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|h| h.name.eq_ignore_ascii_case(&name)) {
            Some(existing) => existing.value = value,
            None => self.0.push(Header { name, value }),
        }
    }

    /// 仅在不存在时写入（先写入者生效），返回是否写入
    pub fn insert_if_absent(&mut self, name: impl Into<String>, value: impl Into<String>) -> bool {
        let name = name.into();
        if self.contains(&name) {
            return false;
        }
        self.0.push(Header {
            name,
            value: value.into(),
        });
        true
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let index = self.0.iter().position(|h| h.name.eq_ignore_ascii_case(name))?;
        Some(self.0.remove(index).value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 请求体中的键值对
#[derive(Debug, Clone, PartialEq)]
pub struct NameValue {
    pub name: String,
    pub value: Value,
}

impl NameValue {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// 文件上传条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Multipart {
    pub name: String,
    pub file_name: Option<String>,
    pub data: FileData,
}

/// 请求体，四种表示形式互斥
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// 数据模板渲染出的原始字符串
    Raw(String),
    /// 键值对，由执行器按内容类型编码为表单或 JSON 对象
    Form(Vec<NameValue>),
    /// 文件上传，附带普通表单字段
    Multipart {
        fields: Vec<NameValue>,
        parts: Vec<Multipart>,
    },
    /// 列表/基础类型参数组成的对象列表，按 JSON 编码
    Objects(Vec<Value>),
}

/// 合成完成、与后端无关的请求
///
/// 每次调用新建，执行完成后即可丢弃；调用方也可以保留它用于检查。
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub interface: String,
    pub method_name: String,
    pub method: HttpMethod,
    pub protocol: String,
    pub host: String,
    /// 协议默认端口时为 `None`
    pub port: Option<u16>,
    pub path: String,
    pub query: Vec<QueryPair>,
    pub headers: Headers,
    pub body: Option<RequestBody>,
    pub charset: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub user_agent: Option<String>,
    /// 超时时间（毫秒）
    pub timeout: Option<u64>,
    pub retry: RetryPolicy,
    pub retryer: Option<Arc<dyn Retryer>>,
    pub ssl_key_store: Option<Arc<SslKeyStore>>,
    pub data_type: DataType,
    pub log_enabled: bool,
    pub is_async: bool,
    pub progress_step: Option<u64>,
    pub on_success: Option<OnSuccess>,
    pub on_error: Option<OnError>,
    pub on_progress: Option<OnProgress>,
    pub interceptors: Vec<InterceptorEntry>,
    pub attributes: AttributeBag,
}

impl RequestDescriptor {
    pub fn new(
        interface: impl Into<String>,
        method_name: impl Into<String>,
        method: HttpMethod,
        protocol: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            method_name: method_name.into(),
            method,
            protocol: protocol.into(),
            host: host.into(),
            port: None,
            path: "/".to_string(),
            query: Vec::new(),
            headers: Headers::new(),
            body: None,
            charset: crate::config::DEFAULT_CHARSET.to_string(),
            content_type: None,
            content_encoding: None,
            user_agent: None,
            timeout: None,
            retry: RetryPolicy::default(),
            retryer: None,
            ssl_key_store: None,
            data_type: DataType::Text,
            log_enabled: true,
            is_async: false,
            progress_step: None,
            on_success: None,
            on_error: None,
            on_progress: None,
            interceptors: Vec::new(),
            attributes: AttributeBag::default(),
        }
    }

    /// 不含查询串的 URL
    pub fn url(&self) -> String {
        match self.port {
            Some(port) => format!("{}://{}:{}{}", self.protocol, self.host, port, self.path),
            None => format!("{}://{}{}", self.protocol, self.host, self.path),
        }
    }

    /// 含查询串的完整 URL，名称和值按 `application/x-www-form-urlencoded` 编码
    pub fn full_url(&self) -> String {
        if self.query.is_empty() {
            return self.url();
        }
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for pair in &self.query {
            match &pair.value {
                Some(value) => serializer.append_pair(&pair.name, value),
                None => serializer.append_key_only(&pair.name),
            };
        }
        format!("{}?{}", self.url(), serializer.finish())
    }

    /// 查找第一个同名查询参数的值
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|pair| pair.name == name)
            .and_then(|pair| pair.value.as_deref())
    }

    pub fn interceptor_attribute(&self, interceptor: &str, name: &str) -> Option<&Value> {
        self.attributes.get(interceptor, name)
    }

    pub fn interceptor_attribute_text(&self, interceptor: &str, name: &str) -> Option<String> {
        self.interceptor_attribute(interceptor, name)
            .and_then(crate::types::args::value_to_text)
    }

    pub fn set_interceptor_attribute(
        &mut self,
        interceptor: &str,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) {
        self.attributes.set(interceptor, name, value);
    }
}
