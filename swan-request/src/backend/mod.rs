//! 执行器抽象：把合成好的请求交给具体的 HTTP 实现

pub mod reqwest_executor;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{Result, SwanError};
use crate::types::{Progress, RequestDescriptor, Response};

pub use reqwest_executor::ReqwestExecutor;

/// 内置后端名称
pub const REQWEST_BACKEND: &str = "reqwest";

/// 进度监听器，由执行器在传输过程中调用
pub type ProgressListener<'a> = &'a mut (dyn FnMut(Progress) + Send);

/// HTTP 执行器
///
/// 执行器只负责单次发送；重试、拦截器与回调都由执行层处理。
/// 非 2xx 状态码不是执行器错误，应作为普通响应返回。
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        progress: ProgressListener<'_>,
    ) -> anyhow::Result<Response>;
}

/// 按后端名称索引的执行器注册表
#[derive(Default, Clone)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn HttpExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, executor: Arc<dyn HttpExecutor>) -> Result<()> {
        let name = name.into();
        if self.executors.contains_key(&name) {
            return Err(SwanError::config(format!(
                "backend \"{}\" is already registered",
                name
            )));
        }
        log::debug!("registering backend \"{}\"", name);
        self.executors.insert(name, executor);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.executors.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn HttpExecutor>> {
        self.executors
            .get(name)
            .cloned()
            .ok_or_else(|| SwanError::config(format!("backend \"{}\" is not registered", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl HttpExecutor for Echo {
        async fn execute(
            &self,
            request: &RequestDescriptor,
            progress: ProgressListener<'_>,
        ) -> anyhow::Result<Response> {
            progress(Progress {
                current_bytes: 1,
                total_bytes: Some(1),
            });
            Ok(Response::new(200, request.url()))
        }
    }

    #[tokio::test]
    async fn test_registry_lookup() {
        let mut registry = ExecutorRegistry::new();
        registry.register("echo", Arc::new(Echo)).unwrap();
        assert!(registry.register("echo", Arc::new(Echo)).is_err());
        assert!(registry.get("okhttp3").err().is_some_and(|e| e.is_configuration()));

        let request = RequestDescriptor::new(
            "Api",
            "get",
            crate::types::HttpMethod::Get,
            "http",
            "example.com",
        );
        let mut reported = Vec::new();
        let response = registry
            .get("echo")
            .unwrap()
            .execute(&request, &mut |p: Progress| reported.push(p))
            .await
            .unwrap();
        assert_eq!(response.text(), "http://example.com/");
        assert_eq!(reported.len(), 1);
    }
}
