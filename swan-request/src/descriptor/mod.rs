//! 接口声明与方法描述符
//!
//! 声明（`InterfaceDecl`、`MethodDecl` 等）是调用方手写的元数据；
//! 注册时它们被解析为不可变的 `MethodDescriptor`，之后每次调用只读不写。

pub mod method;
pub mod param;
pub mod registry;
pub mod resolver;

use serde_json::Value;

use crate::interceptor::{AttributeValue, InterceptorAttributes};
use crate::types::http::{HttpMethod, ParamTarget};

pub use method::MethodDescriptor;
pub use param::{
    CallbackKind, ClassifiedParams, ExpansionMode, MultipartFactory, ParameterBinding, Variable,
};
pub use registry::{DescriptorRegistry, MethodKey};

/// 一个客户端接口的声明
#[derive(Debug, Clone, Default)]
pub struct InterfaceDecl {
    pub name: String,
    pub base: BaseMeta,
    pub methods: Vec<MethodDecl>,
}

impl InterfaceDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn base(mut self, base: BaseMeta) -> Self {
        self.base = base;
        self
    }

    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }
}

/// 接口级（base）配置，被方法级配置覆盖
#[derive(Debug, Clone, Default)]
pub struct BaseMeta {
    pub base_url: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub user_agent: Option<String>,
    pub charset: Option<String>,
    /// `Name: value` 形式的请求头模板
    pub headers: Vec<String>,
    pub timeout: Option<u64>,
    pub retry_count: Option<u32>,
    pub max_retry_interval: Option<u64>,
    pub retryer: Option<String>,
    pub interceptors: Vec<String>,
    pub log_enabled: Option<bool>,
    pub key_store: Option<String>,
    pub attributes: Vec<AttributesDecl>,
}

impl BaseMeta {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn max_retry_interval(mut self, interval_ms: u64) -> Self {
        self.max_retry_interval = Some(interval_ms);
        self
    }

    pub fn retryer(mut self, id: impl Into<String>) -> Self {
        self.retryer = Some(id.into());
        self
    }

    pub fn interceptor(mut self, id: impl Into<String>) -> Self {
        self.interceptors.push(id.into());
        self
    }

    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = Some(enabled);
        self
    }

    pub fn key_store(mut self, id: impl Into<String>) -> Self {
        self.key_store = Some(id.into());
        self
    }

    pub fn attributes(mut self, attributes: AttributesDecl) -> Self {
        self.attributes.push(attributes);
        self
    }
}

/// 方法级请求声明
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    pub url: String,
    /// 请求方法模板，为空时按方法名推断
    pub verb: Option<String>,
    pub data_type: Option<String>,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub user_agent: Option<String>,
    pub charset: Option<String>,
    /// 请求数据模板，多个模板以 `&` 连接
    pub data: Vec<String>,
    pub headers: Vec<String>,
    pub timeout: Option<u64>,
    pub retry_count: Option<u32>,
    pub max_retry_interval: Option<u64>,
    pub retryer: Option<String>,
    pub interceptors: Vec<String>,
    pub key_store: Option<String>,
    pub log_enabled: Option<bool>,
    pub is_async: bool,
    /// 进度回调的字节步长
    pub progress_step: Option<u64>,
}

macro_rules! verb_constructors {
    ($($name:ident => $method:expr),* $(,)?) => {
        $(
            pub fn $name(url: impl Into<String>) -> Self {
                Self::new(url).verb($method.as_str())
            }
        )*
    };
}

impl RequestMeta {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    verb_constructors! {
        get => HttpMethod::Get,
        post => HttpMethod::Post,
        put => HttpMethod::Put,
        patch => HttpMethod::Patch,
        delete => HttpMethod::Delete,
        head => HttpMethod::Head,
        options => HttpMethod::Options,
        trace => HttpMethod::Trace,
    }

    pub fn verb(mut self, verb: impl Into<String>) -> Self {
        self.verb = Some(verb.into());
        self
    }

    pub fn data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.content_encoding = Some(encoding.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn charset(mut self, charset: impl Into<String>) -> Self {
        self.charset = Some(charset.into());
        self
    }

    pub fn data(mut self, data: impl Into<String>) -> Self {
        self.data.push(data.into());
        self
    }

    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.headers.push(header.into());
        self
    }

    pub fn timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout = Some(timeout_ms);
        self
    }

    pub fn retry_count(mut self, count: u32) -> Self {
        self.retry_count = Some(count);
        self
    }

    pub fn max_retry_interval(mut self, interval_ms: u64) -> Self {
        self.max_retry_interval = Some(interval_ms);
        self
    }

    pub fn retryer(mut self, id: impl Into<String>) -> Self {
        self.retryer = Some(id.into());
        self
    }

    pub fn interceptor(mut self, id: impl Into<String>) -> Self {
        self.interceptors.push(id.into());
        self
    }

    pub fn key_store(mut self, id: impl Into<String>) -> Self {
        self.key_store = Some(id.into());
        self
    }

    pub fn log_enabled(mut self, enabled: bool) -> Self {
        self.log_enabled = Some(enabled);
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.is_async = true;
        self
    }

    pub fn progress_step(mut self, bytes: u64) -> Self {
        self.progress_step = Some(bytes);
        self
    }
}

/// 方法声明
///
/// 每个方法必须恰好有一个请求声明，否则注册时报配置错误。
#[derive(Debug, Clone, Default)]
pub struct MethodDecl {
    pub name: String,
    pub requests: Vec<RequestMeta>,
    pub params: Vec<ParamDecl>,
    pub attributes: Vec<AttributesDecl>,
}

impl MethodDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn request(mut self, request: RequestMeta) -> Self {
        self.requests.push(request);
        self
    }

    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }

    pub fn attributes(mut self, attributes: AttributesDecl) -> Self {
        self.attributes.push(attributes);
        self
    }
}

/// 无名称对象参数的声明形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamShape {
    /// 运行时按值判断：数组按列表，对象按 bean，其余按基础类型
    #[default]
    Auto,
    Primitive,
    List,
    Map,
    Bean,
}

/// 参数角色
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRole {
    /// 普通数据参数；有名称时生成一个键值对，无名称时按形态展开
    Data {
        name: Option<String>,
        shape: ParamShape,
        /// JSON 参数，值总是经过 JSON 转换器编码
        json: bool,
    },
    /// 命名变量，只供模板引用
    Variable { name: String },
    /// 只通过 `{下标}` 在模板中引用
    Positional,
    /// 上传文件，名称与文件名均为模板
    File {
        name: String,
        file_name: Option<String>,
    },
    OnSuccess,
    OnError,
    OnProgress,
}

/// 参数声明，与实参按位置对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub role: ParamRole,
    pub target: ParamTarget,
    /// 逗号分隔的过滤器名称
    pub filters: Option<String>,
}

impl ParamDecl {
    fn data(name: Option<String>, shape: ParamShape, json: bool, target: ParamTarget) -> Self {
        Self {
            role: ParamRole::Data { name, shape, json },
            target,
            filters: None,
        }
    }

    fn with_role(role: ParamRole) -> Self {
        Self {
            role,
            target: ParamTarget::Unresolved,
            filters: None,
        }
    }

    /// 按请求方法决定目标的命名参数
    pub fn named(name: impl Into<String>) -> Self {
        Self::data(Some(name.into()), ParamShape::Primitive, false, ParamTarget::Unresolved)
    }

    pub fn query(name: impl Into<String>) -> Self {
        Self::named(name).target(ParamTarget::Query)
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self::named(name).target(ParamTarget::Header)
    }

    pub fn body(name: impl Into<String>) -> Self {
        Self::named(name).target(ParamTarget::Body)
    }

    /// 值作为编码后的路径段追加到 URL 路径末尾
    pub fn path(name: impl Into<String>) -> Self {
        Self::named(name).target(ParamTarget::Path)
    }

    /// 无名称的对象参数，按形态展开
    pub fn object(shape: ParamShape) -> Self {
        Self::data(None, shape, false, ParamTarget::Unresolved)
    }

    /// JSON 参数，编码结果以 `name` 为键
    pub fn json(name: impl Into<String>) -> Self {
        Self::data(Some(name.into()), ParamShape::Auto, true, ParamTarget::Unresolved)
    }

    pub fn variable(name: impl Into<String>) -> Self {
        Self::with_role(ParamRole::Variable { name: name.into() })
    }

    pub fn positional() -> Self {
        Self::with_role(ParamRole::Positional)
    }

    pub fn file(name: impl Into<String>) -> Self {
        Self::with_role(ParamRole::File {
            name: name.into(),
            file_name: None,
        })
    }

    pub fn on_success() -> Self {
        Self::with_role(ParamRole::OnSuccess)
    }

    pub fn on_error() -> Self {
        Self::with_role(ParamRole::OnError)
    }

    pub fn on_progress() -> Self {
        Self::with_role(ParamRole::OnProgress)
    }

    pub fn target(mut self, target: ParamTarget) -> Self {
        self.target = target;
        self
    }

    pub fn filter(mut self, filters: impl Into<String>) -> Self {
        self.filters = Some(filters.into());
        self
    }

    /// 上传文件名模板，只对文件参数有效
    pub fn file_name(mut self, template: impl Into<String>) -> Self {
        if let ParamRole::File { file_name, .. } = &mut self.role {
            *file_name = Some(template.into());
        }
        self
    }
}

/// 拦截器属性声明
///
/// 声明在方法上时，对应的拦截器会自动加入该方法的拦截器列表。
#[derive(Debug, Clone, PartialEq)]
pub struct AttributesDecl {
    pub interceptor: String,
    pub values: Vec<(String, AttributeDeclValue)>,
}

/// 属性声明值：字符串按模板解析，其余按字面量
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeDeclValue {
    Template(String),
    Literal(Value),
}

impl AttributesDecl {
    pub fn new(interceptor: impl Into<String>) -> Self {
        Self {
            interceptor: interceptor.into(),
            values: Vec::new(),
        }
    }

    pub fn template(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.values
            .push((name.into(), AttributeDeclValue::Template(template.into())));
        self
    }

    pub fn literal(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values
            .push((name.into(), AttributeDeclValue::Literal(value.into())));
        self
    }

    pub(crate) fn parse(&self) -> crate::error::Result<InterceptorAttributes> {
        let mut attributes = InterceptorAttributes::new(self.interceptor.clone());
        for (name, value) in &self.values {
            let value = match value {
                AttributeDeclValue::Template(text) => {
                    AttributeValue::Template(crate::parsing::Template::parse(text)?)
                }
                AttributeDeclValue::Literal(value) => AttributeValue::Literal(value.clone()),
            };
            attributes.values.push((name.clone(), value));
        }
        Ok(attributes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_meta_builders() {
        let meta = RequestMeta::post("/users")
            .header("Accept: application/json")
            .data("a=1")
            .timeout(500)
            .asynchronous();
        assert_eq!(meta.verb.as_deref(), Some("POST"));
        assert_eq!(meta.url, "/users");
        assert_eq!(meta.headers, vec!["Accept: application/json"]);
        assert_eq!(meta.timeout, Some(500));
        assert!(meta.is_async);
        assert_eq!(RequestMeta::new("/x").verb, None);
    }

    #[test]
    fn test_param_decl_builders() {
        let param = ParamDecl::query("id");
        assert_eq!(param.target, ParamTarget::Query);
        assert!(matches!(param.role, ParamRole::Data { ref name, json: false, .. } if name.as_deref() == Some("id")));

        let param = ParamDecl::json("user").target(ParamTarget::Query).filter("trim");
        assert!(matches!(param.role, ParamRole::Data { json: true, .. }));
        assert_eq!(param.filters.as_deref(), Some("trim"));

        let file = ParamDecl::file("upload").file_name("{name}.txt");
        assert_eq!(
            file.role,
            ParamRole::File {
                name: "upload".to_string(),
                file_name: Some("{name}.txt".to_string())
            }
        );
        // 非文件参数忽略文件名
        assert_eq!(ParamDecl::named("a").file_name("x"), ParamDecl::named("a"));
    }

    #[test]
    fn test_attributes_parse() {
        let decl = AttributesDecl::new("auth")
            .template("token", "{token}")
            .literal("retries", 3);
        let parsed = decl.parse().unwrap();
        assert_eq!(parsed.interceptor, "auth");
        assert_eq!(parsed.values.len(), 2);
        assert!(AttributesDecl::new("x").template("bad", "{oops").parse().is_err());
    }
}
