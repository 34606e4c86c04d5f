use std::sync::Arc;

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;

use crate::backend::HttpExecutor;
use crate::config::Configuration;
use crate::descriptor::{DescriptorRegistry, InterfaceDecl, MethodDescriptor};
use crate::dispatch;
use crate::error::{Result, SwanError};
use crate::interceptor::InterceptorChain;
use crate::synthesizer::synthesize;
use crate::types::{Argument, RequestDescriptor, Response};

/// Swan 客户端
///
/// 持有全局配置和已注册接口的描述符。手写的接口类型在每个方法里调用
/// `invoke`，由它完成描述符查找、请求合成和执行。
///
/// # 示例
///
/// ```rust,ignore
/// let mut client = Client::new(Configuration::builder().build()?);
/// client.register(&InterfaceDecl::new("UserApi").method(
///     MethodDecl::new("get_user")
///         .request(RequestMeta::get("https://api.example.com/users/{0}"))
///         .param(ParamDecl::positional()),
/// ))?;
/// let user: User = client.invoke_json("UserApi", "get_user", &[Argument::from(1)]).await?;
/// ```
#[derive(Debug)]
pub struct Client {
    config: Arc<Configuration>,
    registry: DescriptorRegistry,
}

impl Client {
    pub fn new(config: Configuration) -> Self {
        Self {
            config: Arc::new(config),
            registry: DescriptorRegistry::new(),
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// 注册接口，构建全部方法描述符
    ///
    /// 配置错误在这里立即返回，而不是推迟到第一次调用。
    pub fn register(&mut self, interface: &InterfaceDecl) -> Result<()> {
        self.registry.register(interface, &self.config)
    }

    pub fn descriptor(&self, interface: &str, method: &str) -> Result<Arc<MethodDescriptor>> {
        self.registry.get(interface, method)
    }

    /// 只合成请求，不执行
    pub fn synthesize(&self, interface: &str, method: &str, args: &[Argument]) -> Result<RequestDescriptor> {
        let descriptor = self.descriptor(interface, method)?;
        synthesize(&descriptor, args, &self.config)
    }

    /// 合成并执行请求
    ///
    /// # 参数
    /// * `interface` - 接口名
    /// * `method` - 方法名
    /// * `args` - 与参数声明按位置对应的实参
    ///
    /// # 返回值
    /// 2xx 响应，或合成、拦截、执行过程中的错误
    pub async fn invoke(&self, interface: &str, method: &str, args: &[Argument]) -> Result<Response> {
        let (request, executor) = self.prepare(interface, method, args)?;
        dispatch::execute(request, executor.as_ref()).await
    }

    /// 执行请求并把响应体反序列化为 `T`
    pub async fn invoke_json<T: DeserializeOwned>(
        &self,
        interface: &str,
        method: &str,
        args: &[Argument],
    ) -> Result<T> {
        let response = self.invoke(interface, method, args).await?;
        response
            .json()
            .map_err(|e| SwanError::conversion(format!("response of {}.{}", interface, method), e))
    }

    /// 在 tokio 运行时上异步执行
    ///
    /// 结果通过实参中的回调送达；合成阶段的错误同样交给 `on_error` 回调。
    pub fn spawn(
        self: &Arc<Self>,
        interface: impl Into<String>,
        method: impl Into<String>,
        args: Vec<Argument>,
    ) -> JoinHandle<Result<Response>> {
        let client = Arc::clone(self);
        let interface = interface.into();
        let method = method.into();
        tokio::spawn(async move {
            match client.prepare(&interface, &method, &args) {
                Ok((request, executor)) => dispatch::execute(request, executor.as_ref()).await,
                Err(error) => {
                    log::warn!("[Swan] {}.{} failed before dispatch: {}", interface, method, error);
                    for argument in &args {
                        if let Argument::OnError(callback) = argument {
                            callback.call(&error);
                        }
                    }
                    Err(error)
                }
            }
        })
    }

    fn prepare(
        &self,
        interface: &str,
        method: &str,
        args: &[Argument],
    ) -> Result<(RequestDescriptor, Arc<dyn HttpExecutor>)> {
        let descriptor = self.descriptor(interface, method)?;
        let mut request = synthesize(&descriptor, args, &self.config)?;
        InterceptorChain::on_invoke_method(&mut request, &descriptor, args);
        let executor = self.config.executors().get(&self.config.settings().backend)?;
        Ok((request, executor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;

    use crate::backend::ProgressListener;
    use crate::descriptor::{MethodDecl, ParamDecl, RequestMeta};
    use crate::interceptor::Interceptor;

    /// 记录收到的请求并返回固定响应
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl HttpExecutor for Recorder {
        async fn execute(
            &self,
            request: &RequestDescriptor,
            _progress: ProgressListener<'_>,
        ) -> anyhow::Result<Response> {
            let method_header = request.headers.get("X-Method").map(str::to_string);
            self.seen.lock().unwrap().push((request.full_url(), method_header));
            Ok(Response::new(200, r#"{"id":7,"name":"bob"}"#))
        }
    }

    struct MethodTagger;

    impl Interceptor for MethodTagger {
        fn on_invoke_method(&self, request: &mut RequestDescriptor, method: &MethodDescriptor, _args: &[Argument]) {
            request.headers.set("X-Method", method.name());
        }
    }

    struct Deny;

    impl Interceptor for Deny {
        fn before_execute(&self, _request: &mut RequestDescriptor) -> bool {
            false
        }
    }

    fn client(recorder: Arc<Recorder>) -> Client {
        let config = Configuration::builder()
            .backend("mock")
            .register_executor("mock", recorder)
            .unwrap()
            .register_interceptor_instance("tagger", Arc::new(MethodTagger))
            .unwrap()
            .register_interceptor_instance("deny", Arc::new(Deny))
            .unwrap()
            .interceptor("tagger")
            .build()
            .unwrap();
        let mut client = Client::new(config);
        client
            .register(
                &InterfaceDecl::new("UserApi")
                    .method(
                        MethodDecl::new("get_user")
                            .request(RequestMeta::get("http://a.com/users/{0}"))
                            .param(ParamDecl::positional()),
                    )
                    .method(
                        MethodDecl::new("delete_user")
                            .request(RequestMeta::delete("http://a.com/users/{0}").interceptor("deny"))
                            .param(ParamDecl::positional()),
                    )
                    .method(
                        MethodDecl::new("custom")
                            .request(RequestMeta::new("http://a.com/users").verb("{0}"))
                            .param(ParamDecl::positional())
                            .param(ParamDecl::on_error()),
                    ),
            )
            .unwrap();
        client
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: u32,
        name: String,
    }

    #[tokio::test]
    async fn test_invoke_runs_full_pipeline() {
        let recorder = Arc::new(Recorder::default());
        let client = client(recorder.clone());

        let user: User = client.invoke_json("UserApi", "get_user", &[Argument::from(7)]).await.unwrap();
        assert_eq!(
            user,
            User {
                id: 7,
                name: "bob".to_string()
            }
        );
        let seen = recorder.seen.lock().unwrap();
        assert_eq!(seen[0], ("http://a.com/users/7".to_string(), Some("get_user".to_string())));
    }

    #[tokio::test]
    async fn test_refused_request_never_reaches_executor() {
        let recorder = Arc::new(Recorder::default());
        let client = client(recorder.clone());

        let err = client.invoke("UserApi", "delete_user", &[Argument::from(7)]).await.unwrap_err();
        assert!(matches!(err, SwanError::Refused(ref id) if id == "deny"));
        assert!(recorder.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_routes_synthesis_errors_to_callback() {
        let client = Arc::new(client(Arc::new(Recorder::default())));
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let on_error = Argument::on_error(move |error| {
            assert!(matches!(error, SwanError::UnsupportedType { .. }));
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let result = client
            .spawn("UserApi", "custom", vec!["FETCH".into(), on_error])
            .await
            .unwrap();
        assert!(result.is_err());
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_lookup_errors() {
        let client = client(Arc::new(Recorder::default()));
        assert!(client.synthesize("UserApi", "missing", &[]).unwrap_err().is_configuration());
        let request = client.synthesize("UserApi", "get_user", &[Argument::from(1)]).unwrap();
        assert_eq!(request.full_url(), "http://a.com/users/1");
    }
}
