//! # Swan Request
//!
//! 声明式 HTTP 客户端的请求合成引擎。
//!
//! 接口以构建器形式声明（`InterfaceDecl`、`MethodDecl`、`RequestMeta`、`ParamDecl`），
//! 注册时一次性解析为不可变的 `MethodDescriptor`；每次调用时由 `synthesize`
//! 把描述符和实参合成为与后端无关的 `RequestDescriptor`，再交给执行层
//! （拦截器、重试、回调）和具体的 `HttpExecutor`。
//!
//! 配置按方法、接口、全局三级覆盖：方法级值优先，其次接口级，最后是全局配置。

pub mod backend;
pub mod client;
pub mod config;
pub mod converter;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod parsing;
pub mod synthesizer;
pub mod types;

pub use backend::{ExecutorRegistry, HttpExecutor, ProgressListener, REQWEST_BACKEND, ReqwestExecutor};
pub use client::Client;
pub use config::{ConfigSettings, Configuration, ConfigurationBuilder, DEFAULT_CHARSET, SslKeyStore};
pub use converter::{JsonConverter, SerdeJsonConverter};
pub use descriptor::{
    AttributeDeclValue, AttributesDecl, BaseMeta, DescriptorRegistry, InterfaceDecl, MethodDecl,
    MethodDescriptor, MethodKey, ParamDecl, ParamRole, ParamShape, RequestMeta,
};
pub use error::{Result, SwanError};
pub use filter::{Filter, FilterChain, FilterRegistry, FilterSpec, JSON_FILTER, JsonFilter};
pub use interceptor::{
    AttributeBag, Interceptor, InterceptorCache, InterceptorChain, InterceptorEntry, InterceptorFactory,
    NoOpInterceptor,
};
pub use parsing::{Template, VariableScope};
pub use synthesizer::synthesize;
pub use types::{
    Argument, BackOffRetryer, DataType, FileData, Header, Headers, HttpMethod, Multipart, NameValue,
    NoneRetryer, OnError, OnProgress, OnSuccess, ParamTarget, Progress, QueryPair, RequestBody,
    RequestDescriptor, Response, RetryPolicy, Retryer, RetryerFactory,
};
