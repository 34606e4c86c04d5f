//! 执行层：拦截器生命周期、重试循环与回调

use std::sync::Arc;

use crate::backend::HttpExecutor;
use crate::error::{Result, SwanError};
use crate::interceptor::InterceptorChain;
use crate::types::retry::{NoneRetryer, Retryer, is_retriable_status};
use crate::types::{Progress, RequestDescriptor, Response};

/// 执行合成好的请求
///
/// 依次运行 `before_execute` 链、带重试的执行器调用、`after_execute`，
/// 最后按结果调用 `on_success` 或 `on_error` 以及对应的回调。
///
/// # 参数
/// * `request` - 合成好的请求
/// * `executor` - 后端执行器
///
/// # 返回值
/// 2xx 响应；被拦截器拒绝时返回 `Refused`，重试用尽后返回最后一次的
/// `Status` 或 `Execution` 错误
pub async fn execute(mut request: RequestDescriptor, executor: &dyn HttpExecutor) -> Result<Response> {
    if let Err(id) = InterceptorChain::before_execute(&mut request) {
        return Err(SwanError::Refused(id));
    }

    if request.log_enabled {
        log::info!(
            "[Swan] {}.{}: {} {}",
            request.interface,
            request.method_name,
            request.method,
            request.full_url()
        );
    }

    let retryer: Arc<dyn Retryer> = request.retryer.clone().unwrap_or_else(|| Arc::new(NoneRetryer));
    let mut throttle = ProgressThrottle::new(request.progress_step);
    let mut listener = |progress: Progress| {
        if throttle.due(&progress) {
            InterceptorChain::on_progress(&request, &progress);
            if let Some(callback) = &request.on_progress {
                callback.call(&progress);
            }
        }
    };

    let mut attempt = 0;
    let outcome = loop {
        let result = executor.execute(&request, &mut listener).await;
        let reason = match &result {
            Ok(response) if is_retriable_status(response.status) => Some(format!("status {}", response.status)),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        };
        match reason {
            Some(reason) if retryer.can_retry(attempt) => {
                let delay = retryer.next_interval(attempt);
                attempt += 1;
                if request.log_enabled {
                    log::warn!(
                        "Request {}.{} failed ({}), retrying attempt {}/{} after {}ms",
                        request.interface,
                        request.method_name,
                        reason,
                        attempt,
                        retryer.max_retries(),
                        delay.as_millis()
                    );
                }
                tokio::time::sleep(delay).await;
            }
            _ => break result,
        }
    };

    match outcome {
        Ok(response) => {
            InterceptorChain::after_execute(&request, &response);
            if response.is_success() {
                if request.log_enabled {
                    log::info!("[Swan] Response status: {}", response.status);
                }
                InterceptorChain::on_success(&request, &response);
                if let Some(callback) = &request.on_success {
                    callback.call(&response);
                }
                Ok(response)
            } else {
                let error = SwanError::Status {
                    status: response.status,
                    body: response.text(),
                };
                Err(fail(&request, error))
            }
        }
        Err(e) => Err(fail(&request, SwanError::Execution(e))),
    }
}

fn fail(request: &RequestDescriptor, error: SwanError) -> SwanError {
    if request.log_enabled {
        log::warn!("[Swan] {}.{} failed: {}", request.interface, request.method_name, error);
    }
    InterceptorChain::on_error(request, &error);
    if let Some(callback) = &request.on_error {
        callback.call(&error);
    }
    error
}

/// 按字节步长节流进度通知，传输完成时总会通知
struct ProgressThrottle {
    step: Option<u64>,
    last_reported: u64,
}

impl ProgressThrottle {
    fn new(step: Option<u64>) -> Self {
        Self {
            step,
            last_reported: 0,
        }
    }

    fn due(&mut self, progress: &Progress) -> bool {
        let due = progress.is_done()
            || match self.step {
                Some(step) => progress.current_bytes.saturating_sub(self.last_reported) >= step,
                None => true,
            };
        if due {
            self.last_reported = progress.current_bytes;
        }
        due
    }
}
