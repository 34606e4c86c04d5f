use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crate::types::request::RequestDescriptor;

/// 内置退避重试器标识
pub const BACKOFF_RETRYER: &str = "backoff";
/// 内置不重试标识
pub const NONE_RETRYER: &str = "none";

/// 退避基础间隔（毫秒）
const BACKOFF_BASE_MS: u64 = 1000;
/// 随机抖动比例
const JITTER_RATIO: f64 = 0.1;

/// 已解析的重试参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 重试器标识
    pub retryer: String,
    /// 最大重试次数（不含首次请求）
    pub retry_count: u32,
    /// 最大重试间隔（毫秒）
    pub max_retry_interval_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retryer: BACKOFF_RETRYER.to_string(),
            retry_count: 0,
            max_retry_interval_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn new(retryer: impl Into<String>, retry_count: u32, max_retry_interval_ms: u64) -> Self {
        Self {
            retryer: retryer.into(),
            retry_count,
            max_retry_interval_ms,
        }
    }
}

/// 重试器：决定还能否重试以及下一次重试前的等待时间
pub trait Retryer: Send + Sync + Debug {
    /// 允许的最大重试次数
    fn max_retries(&self) -> u32;

    /// 第 `attempt` 次重试前的等待时间（`attempt` 从 0 开始）
    fn next_interval(&self, attempt: u32) -> Duration;

    /// 已重试 `attempt` 次后是否还能继续
    fn can_retry(&self, attempt: u32) -> bool {
        attempt < self.max_retries()
    }
}

/// 以请求为唯一参数的重试器工厂
pub type RetryerFactory = Arc<dyn Fn(&RequestDescriptor) -> Arc<dyn Retryer> + Send + Sync>;

/// 指数退避重试器
///
/// 第 n 次重试等待 `2^n * 1000` 毫秒，并叠加最多 10% 的随机抖动，
/// 结果不超过最大重试间隔；最大重试间隔为 0 时不等待。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackOffRetryer {
    max_retries: u32,
    max_interval_ms: u64,
}

impl BackOffRetryer {
    pub fn new(request: &RequestDescriptor) -> Self {
        Self::with_limits(request.retry.retry_count, request.retry.max_retry_interval_ms)
    }

    pub fn with_limits(max_retries: u32, max_interval_ms: u64) -> Self {
        Self {
            max_retries,
            max_interval_ms,
        }
    }

    /// 不含抖动的退避间隔（毫秒）
    pub fn base_interval_ms(&self, attempt: u32) -> u64 {
        let exponential = 2u64
            .checked_pow(attempt)
            .and_then(|factor| factor.checked_mul(BACKOFF_BASE_MS))
            .unwrap_or(u64::MAX);
        exponential.min(self.max_interval_ms)
    }
}

impl Retryer for BackOffRetryer {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn next_interval(&self, attempt: u32) -> Duration {
        let base = self.base_interval_ms(attempt);
        if base == 0 {
            return Duration::ZERO;
        }
        // 抖动后仍受最大间隔限制
        let jitter = (base as f64 * JITTER_RATIO * fastrand::f64()) as u64;
        let delay = base.saturating_add(jitter).min(self.max_interval_ms);
        Duration::from_millis(delay)
    }
}

/// 从不重试
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoneRetryer;

impl Retryer for NoneRetryer {
    fn max_retries(&self) -> u32 {
        0
    }

    fn next_interval(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// 判断HTTP状态码是否应该重试
pub fn is_retriable_status(status: u16) -> bool {
    match status {
        // 5xx 服务器错误
        500..=599 => true,
        // 429 限流
        429 => true,
        // 408 请求超时
        408 => true,
        _ => false,
    }
}

#[cfg(test)]
mod basic_tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retryer, BACKOFF_RETRYER);
        assert_eq!(policy.retry_count, 0);
        assert_eq!(policy.max_retry_interval_ms, 0);
    }

    #[test]
    fn test_backoff_reads_request_policy() {
        let mut request = RequestDescriptor::new(
            "Api",
            "get",
            crate::types::http::HttpMethod::Get,
            "http",
            "localhost",
        );
        request.retry = RetryPolicy::new(BACKOFF_RETRYER, 3, 5000);
        let retryer = BackOffRetryer::new(&request);
        assert_eq!(retryer.max_retries(), 3);
        assert!(retryer.can_retry(2));
        assert!(!retryer.can_retry(3));
    }

    #[test]
    fn test_should_retry_status() {
        assert!(is_retriable_status(500));
        assert!(is_retriable_status(502));
        assert!(is_retriable_status(429));
        assert!(is_retriable_status(408));

        assert!(!is_retriable_status(200));
        assert!(!is_retriable_status(400));
        assert!(!is_retriable_status(404));
    }
}

// 引入详细测试模块
#[path = "retry_test.rs"]
mod comprehensive_retry_tests;
