use crate::descriptor::MethodDescriptor;
use crate::error::SwanError;
use crate::interceptor::InterceptorEntry;
use crate::types::{Argument, Progress, RequestDescriptor, Response};

/// 按请求上的拦截器顺序（全局、接口、方法）依次调用钩子
pub struct InterceptorChain;

impl InterceptorChain {
    pub fn on_invoke_method(
        request: &mut RequestDescriptor,
        method: &MethodDescriptor,
        args: &[Argument],
    ) {
        for entry in Self::snapshot(request) {
            entry.interceptor.on_invoke_method(request, method, args);
        }
    }

    /// 任一拦截器拒绝时立即停止，返回该拦截器的标识
    pub fn before_execute(request: &mut RequestDescriptor) -> Result<(), String> {
        for entry in Self::snapshot(request) {
            if !entry.interceptor.before_execute(request) {
                log::debug!(
                    "interceptor \"{}\" refused {}.{}",
                    entry.id,
                    request.interface,
                    request.method_name
                );
                return Err(entry.id);
            }
        }
        Ok(())
    }

    pub fn after_execute(request: &RequestDescriptor, response: &Response) {
        for entry in &request.interceptors {
            entry.interceptor.after_execute(request, response);
        }
    }

    pub fn on_success(request: &RequestDescriptor, response: &Response) {
        for entry in &request.interceptors {
            entry.interceptor.on_success(request, response);
        }
    }

    pub fn on_error(request: &RequestDescriptor, error: &SwanError) {
        for entry in &request.interceptors {
            entry.interceptor.on_error(request, error);
        }
    }

    pub fn on_progress(request: &RequestDescriptor, progress: &Progress) {
        for entry in &request.interceptors {
            entry.interceptor.on_progress(request, progress);
        }
    }

    // 钩子可以修改请求，先复制一份拦截器列表
    fn snapshot(request: &RequestDescriptor) -> Vec<InterceptorEntry> {
        request.interceptors.clone()
    }
}
