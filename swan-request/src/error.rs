use thiserror::Error;

/// 请求合成与执行过程中的统一结果类型
pub type Result<T, E = SwanError> = std::result::Result<T, E>;

/// Swan 错误类型
///
/// 注册期错误（`Configuration`、`Template`）在构建方法描述符时立即抛出；
/// 其余错误在单次调用中产生，只影响当前请求。
#[derive(Debug, Error)]
pub enum SwanError {
    /// 方法声明或全局配置有误，例如重复的请求声明、未注册的拦截器/过滤器/变量
    #[error("configuration error: {0}")]
    Configuration(String),

    /// 模板语法错误
    #[error("template error in \"{template}\" at offset {offset}: {message}")]
    Template {
        template: String,
        offset: usize,
        message: String,
    },

    /// 渲染后的 URL 无法解析
    #[error("malformed url \"{url}\": {source}")]
    Url {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// 不支持的请求方法或数据类型
    #[error("unsupported {kind} \"{value}\"")]
    UnsupportedType { kind: &'static str, value: String },

    /// 过滤器或 JSON 转换器失败
    #[error("conversion failed for {context}: {source}")]
    Conversion {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    /// 调用参数个数与方法声明不一致
    #[error("method \"{method}\" expects {expected} arguments, got {actual}")]
    ArgumentCount {
        method: String,
        expected: usize,
        actual: usize,
    },

    /// 拦截器在 before_execute 中拒绝了请求
    #[error("request refused by interceptor \"{0}\"")]
    Refused(String),

    /// 服务端返回了非成功状态码
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },

    /// 执行器（后端）失败
    #[error("request execution failed: {0}")]
    Execution(#[source] anyhow::Error),
}

impl SwanError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        SwanError::Configuration(message.into())
    }

    pub(crate) fn conversion(context: impl Into<String>, source: anyhow::Error) -> Self {
        SwanError::Conversion {
            context: context.into(),
            source,
        }
    }

    /// 是否为注册期（结构性）错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, SwanError::Configuration(_) | SwanError::Template { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = SwanError::UnsupportedType {
            kind: "http method",
            value: "FETCH".to_string(),
        };
        assert_eq!(err.to_string(), "unsupported http method \"FETCH\"");

        let err = SwanError::config("filter \"trim\" does not exist");
        assert!(err.is_configuration());
        assert!(err.to_string().contains("trim"));
    }

    #[test]
    fn test_conversion_keeps_source() {
        let err = SwanError::conversion("parameter \"user\"", anyhow::anyhow!("boom"));
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("boom"));
        assert!(!err.is_configuration());
    }
}
