use std::sync::Arc;

use crate::config::{Configuration, DEFAULT_CHARSET, SslKeyStore};
use crate::descriptor::{BaseMeta, RequestMeta};
use crate::error::Result;
use crate::parsing::{Template, VariableScope};
use crate::types::retry::{BACKOFF_RETRYER, RetryPolicy, RetryerFactory};

/// 非空白字符串
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// 方法值优先，其次接口值，再次全局值
pub fn first_present<T>(method: Option<T>, base: Option<T>, global: Option<T>) -> Option<T> {
    method.or(base).or(global)
}

/// 逐级回退的模板字段
///
/// 每次调用时依次渲染方法级、接口级模板，取第一个非空白的结果，
/// 都为空时使用全局值。
#[derive(Debug, Clone, Default)]
pub struct TieredTemplate {
    method: Option<Template>,
    base: Option<Template>,
    global: Option<String>,
}

impl TieredTemplate {
    pub fn new(method: &Option<String>, base: &Option<String>, global: Option<&str>) -> Result<Self> {
        Ok(Self {
            method: present(method).map(Template::parse).transpose()?,
            base: present(base).map(Template::parse).transpose()?,
            global: global
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string),
        })
    }

    pub fn render(&self, scope: &dyn VariableScope) -> Result<Option<String>> {
        for template in [&self.method, &self.base].into_iter().flatten() {
            let rendered = template.render(scope)?;
            let rendered = rendered.trim();
            if !rendered.is_empty() {
                return Ok(Some(rendered.to_string()));
            }
        }
        Ok(self.global.clone())
    }

    pub(crate) fn templates(&self) -> impl Iterator<Item = &Template> {
        [&self.method, &self.base].into_iter().flatten()
    }
}

/// 注册期一次性解析的标量配置
#[derive(Clone)]
pub struct ResolvedSettings {
    pub timeout: Option<u64>,
    pub retry: RetryPolicy,
    pub retryer_factory: RetryerFactory,
    pub log_enabled: bool,
    pub key_store: Option<Arc<SslKeyStore>>,
    pub content_type: TieredTemplate,
    pub content_encoding: TieredTemplate,
    pub user_agent: TieredTemplate,
    pub charset: TieredTemplate,
}

impl std::fmt::Debug for ResolvedSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedSettings")
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .field("log_enabled", &self.log_enabled)
            .field("key_store", &self.key_store.as_ref().map(|k| &k.id))
            .finish_non_exhaustive()
    }
}

/// 合并方法、接口、全局三级配置
///
/// 重试器和证书库标识在这里校验，未注册时返回配置错误。
pub fn resolve(request: &RequestMeta, base: &BaseMeta, config: &Configuration) -> Result<ResolvedSettings> {
    let global = config.settings();

    let timeout = first_present(request.timeout, base.timeout, global.timeout);
    let retry_count = first_present(request.retry_count, base.retry_count, global.retry_count).unwrap_or(0);
    let max_retry_interval = first_present(
        request.max_retry_interval,
        base.max_retry_interval,
        global.max_retry_interval,
    )
    .unwrap_or(0);
    let retryer = first_present(
        present(&request.retryer),
        present(&base.retryer),
        present(&global.retryer),
    )
    .unwrap_or(BACKOFF_RETRYER)
    .to_string();
    let retryer_factory = config.retryer_factory(&retryer)?.clone();
    let log_enabled = first_present(request.log_enabled, base.log_enabled, Some(global.log_enabled))
        .unwrap_or(true);
    let key_store = first_present(present(&request.key_store), present(&base.key_store), None)
        .map(|id| config.key_store(id))
        .transpose()?;

    Ok(ResolvedSettings {
        timeout,
        retry: RetryPolicy::new(retryer, retry_count, max_retry_interval),
        retryer_factory,
        log_enabled,
        key_store,
        content_type: TieredTemplate::new(&request.content_type, &base.content_type, global.content_type.as_deref())?,
        content_encoding: TieredTemplate::new(
            &request.content_encoding,
            &base.content_encoding,
            global.content_encoding.as_deref(),
        )?,
        user_agent: TieredTemplate::new(&request.user_agent, &base.user_agent, global.user_agent.as_deref())?,
        charset: TieredTemplate::new(
            &request.charset,
            &base.charset,
            Some(global.charset.as_str()).filter(|c| !c.trim().is_empty()).or(Some(DEFAULT_CHARSET)),
        )?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config() -> Configuration {
        Configuration::builder()
            .timeout(3000)
            .retry_count(0)
            .register_key_store(SslKeyStore::new("ks", "client.p12", None))
            .unwrap()
            .build()
            .unwrap()
    }

    #[test]
    fn test_timeout_precedence() {
        let config = config();
        let method = RequestMeta::get("/x").timeout(100);
        let base = BaseMeta::new().timeout(200);
        assert_eq!(resolve(&method, &base, &config).unwrap().timeout, Some(100));
        assert_eq!(
            resolve(&RequestMeta::get("/x"), &base, &config).unwrap().timeout,
            Some(200)
        );
        assert_eq!(
            resolve(&RequestMeta::get("/x"), &BaseMeta::new(), &config)
                .unwrap()
                .timeout,
            Some(3000)
        );

        let no_global = Configuration::builder().without_timeout().build().unwrap();
        assert_eq!(
            resolve(&RequestMeta::get("/x"), &BaseMeta::new(), &no_global)
                .unwrap()
                .timeout,
            None
        );
    }

    #[test]
    fn test_content_precedence() {
        let config = Configuration::builder()
            .content_type("application/json")
            .content_encoding("gzip")
            .user_agent("swan-global")
            .build()
            .unwrap();

        let global_only = resolve(&RequestMeta::get("/x"), &BaseMeta::new(), &config).unwrap();
        assert_eq!(global_only.content_type.render(&()).unwrap().as_deref(), Some("application/json"));
        assert_eq!(global_only.content_encoding.render(&()).unwrap().as_deref(), Some("gzip"));
        assert_eq!(global_only.user_agent.render(&()).unwrap().as_deref(), Some("swan-global"));

        let base = BaseMeta::new().content_type("text/xml").user_agent("swan-base");
        let from_base = resolve(&RequestMeta::get("/x"), &base, &config).unwrap();
        assert_eq!(from_base.content_type.render(&()).unwrap().as_deref(), Some("text/xml"));
        assert_eq!(from_base.content_encoding.render(&()).unwrap().as_deref(), Some("gzip"));
        assert_eq!(from_base.user_agent.render(&()).unwrap().as_deref(), Some("swan-base"));

        let method = RequestMeta::get("/x").content_type("text/plain").content_encoding("br");
        let from_method = resolve(&method, &base, &config).unwrap();
        assert_eq!(from_method.content_type.render(&()).unwrap().as_deref(), Some("text/plain"));
        assert_eq!(from_method.content_encoding.render(&()).unwrap().as_deref(), Some("br"));
        assert_eq!(from_method.user_agent.render(&()).unwrap().as_deref(), Some("swan-base"));

        let unset = resolve(&RequestMeta::get("/x"), &BaseMeta::new(), &self::config());
        assert_eq!(unset.unwrap().content_type.render(&()).unwrap(), None);
    }

    #[test]
    fn test_retry_precedence() {
        let config = Configuration::builder()
            .retry_count(1)
            .max_retry_interval(1000)
            .retryer("none")
            .build()
            .unwrap();

        let global_only = resolve(&RequestMeta::get("/x"), &BaseMeta::new(), &config).unwrap();
        assert_eq!(global_only.retry, RetryPolicy::new("none", 1, 1000));

        let base = BaseMeta::new().retry_count(2).max_retry_interval(2000).retryer("backoff");
        let from_base = resolve(&RequestMeta::get("/x"), &base, &config).unwrap();
        assert_eq!(from_base.retry, RetryPolicy::new("backoff", 2, 2000));

        let method = RequestMeta::get("/x").retry_count(3).max_retry_interval(3000).retryer("none");
        let from_method = resolve(&method, &base, &config).unwrap();
        assert_eq!(from_method.retry, RetryPolicy::new("none", 3, 3000));

        // 空白值视为未设置
        let blank = RequestMeta::get("/x").retryer("  ");
        assert_eq!(resolve(&blank, &base, &config).unwrap().retry.retryer, "backoff");
    }

    #[test]
    fn test_unknown_ids_fail_at_resolution() {
        let config = config();
        let err = resolve(&RequestMeta::get("/x").retryer("fancy"), &BaseMeta::new(), &config).unwrap_err();
        assert!(err.is_configuration());

        let err = resolve(&RequestMeta::get("/x"), &BaseMeta::new().key_store("missing"), &config).unwrap_err();
        assert!(err.is_configuration());

        let ok = resolve(&RequestMeta::get("/x").key_store("ks"), &BaseMeta::new(), &config).unwrap();
        assert_eq!(ok.key_store.map(|k| k.id.clone()).as_deref(), Some("ks"));
    }

    #[test]
    fn test_tiered_template_falls_back_on_blank_render() {
        let tiered = TieredTemplate::new(
            &Some("{ct}".to_string()),
            &Some("application/json".to_string()),
            None,
        )
        .unwrap();
        let mut scope: HashMap<String, String> = HashMap::new();
        assert_eq!(
            tiered.render(&scope).unwrap().as_deref(),
            Some("application/json")
        );
        scope.insert("ct".to_string(), "text/xml".to_string());
        assert_eq!(tiered.render(&scope).unwrap().as_deref(), Some("text/xml"));

        let charset = TieredTemplate::new(&None, &Some(" ".to_string()), Some("UTF-8")).unwrap();
        assert_eq!(charset.render(&()).unwrap().as_deref(), Some("UTF-8"));
    }
}
