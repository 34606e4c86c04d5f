use std::fmt;
use std::sync::Arc;

use crate::descriptor::MethodDescriptor;
use crate::error::SwanError;
use crate::types::{Argument, Progress, RequestDescriptor, Response};

/// Swan 拦截器接口
///
/// 所有钩子都有空的默认实现，按需覆盖即可。拦截器可以在钩子中通过
/// `RequestDescriptor::set_interceptor_attribute` 读写以自身标识为键的属性。
pub trait Interceptor: Send + Sync {
    /// 请求合成完成、执行之前调用
    ///
    /// # 参数
    /// - `request`: 本次调用合成的请求
    /// - `method`: 方法描述符
    /// - `args`: 本次调用的实参
    fn on_invoke_method(
        &self,
        _request: &mut RequestDescriptor,
        _method: &MethodDescriptor,
        _args: &[Argument],
    ) {
    }

    /// 执行前调用，返回 `false` 时放弃本次请求，执行器不会被调用
    fn before_execute(&self, _request: &mut RequestDescriptor) -> bool {
        true
    }

    /// 收到响应后调用（无论状态码）
    fn after_execute(&self, _request: &RequestDescriptor, _response: &Response) {}

    /// 请求成功
    fn on_success(&self, _request: &RequestDescriptor, _response: &Response) {}

    /// 请求失败
    fn on_error(&self, _request: &RequestDescriptor, _error: &SwanError) {}

    /// 传输进度
    fn on_progress(&self, _request: &RequestDescriptor, _progress: &Progress) {}
}

/// 空拦截器实现，用于测试和默认情况
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpInterceptor;

impl Interceptor for NoOpInterceptor {}

/// 带标识的拦截器，属性按标识归属
#[derive(Clone)]
pub struct InterceptorEntry {
    pub id: String,
    pub interceptor: Arc<dyn Interceptor>,
}

impl InterceptorEntry {
    pub fn new(id: impl Into<String>, interceptor: Arc<dyn Interceptor>) -> Self {
        Self {
            id: id.into(),
            interceptor,
        }
    }
}

impl fmt::Debug for InterceptorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("InterceptorEntry").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HttpMethod;

    #[test]
    fn test_no_op_interceptor_defaults() {
        let interceptor = NoOpInterceptor;
        let mut request =
            RequestDescriptor::new("Api", "get_data", HttpMethod::Get, "http", "localhost");
        assert!(interceptor.before_execute(&mut request));

        let response = Response::new(200, "ok");
        interceptor.after_execute(&request, &response);
        interceptor.on_success(&request, &response);
        interceptor.on_error(&request, &SwanError::Refused("x".to_string()));
    }

    #[test]
    fn test_entry_debug_shows_id() {
        let entry = InterceptorEntry::new("auth", Arc::new(NoOpInterceptor));
        assert_eq!(format!("{:?}", entry), "InterceptorEntry(\"auth\")");
    }
}
