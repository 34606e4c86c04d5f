use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::{info, warn};
use swan_request::{
    Argument, Client, Configuration, HttpExecutor, InterfaceDecl, MethodDecl, ParamDecl, Progress,
    ProgressListener, RequestDescriptor, RequestMeta, Response, Retryer, RetryerFactory,
};

/// 模拟不稳定服务的执行器：前 `failures` 次返回 503
struct FlakyExecutor {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyExecutor {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl HttpExecutor for FlakyExecutor {
    async fn execute(&self, request: &RequestDescriptor, progress: ProgressListener<'_>) -> anyhow::Result<Response> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            warn!("第 {} 次调用 {}: 模拟 503", call, request.full_url());
            return Ok(Response::new(503, "service unavailable"));
        }
        let body = format!(r#"{{"call":{},"payload":"{}"}}"#, call, "x".repeat(4096));
        let total = body.len() as u64;
        for current in (1024..total).step_by(1024).chain([total]) {
            progress(Progress {
                current_bytes: current,
                total_bytes: Some(total),
            });
        }
        Ok(Response::new(200, body))
    }
}

/// 固定间隔重试器
#[derive(Debug)]
struct FixedRetryer {
    max_retries: u32,
    interval: Duration,
}

impl Retryer for FixedRetryer {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn next_interval(&self, _attempt: u32) -> Duration {
        self.interval
    }
}

const FLAKY_API: &str = "FlakyApi";

fn flaky_api() -> InterfaceDecl {
    InterfaceDecl::new(FLAKY_API)
        .method(
            MethodDecl::new("fetch_no_retry")
                .request(RequestMeta::get("http://flaky.local/data").retry_count(0)),
        )
        .method(
            MethodDecl::new("fetch_with_backoff")
                .request(
                    RequestMeta::get("http://flaky.local/data")
                        .retry_count(3)
                        .max_retry_interval(200),
                ),
        )
        .method(
            MethodDecl::new("fetch_fixed")
                .request(
                    RequestMeta::get("http://flaky.local/data")
                        .retryer("fixed")
                        .retry_count(5)
                        .progress_step(1024)
                        .asynchronous(),
                )
                .param(ParamDecl::on_success())
                .param(ParamDecl::on_progress()),
        )
}

fn client(failures: u32) -> anyhow::Result<Client> {
    let fixed: RetryerFactory = Arc::new(|request: &RequestDescriptor| {
        Arc::new(FixedRetryer {
            max_retries: request.retry.retry_count,
            interval: Duration::from_millis(50),
        }) as Arc<dyn Retryer>
    });
    let config = Configuration::builder()
        .backend("flaky")
        .register_executor("flaky", Arc::new(FlakyExecutor::new(failures)))?
        .register_retryer("fixed", fixed)?
        .build()?;
    let mut client = Client::new(config);
    client.register(&flaky_api())?;
    Ok(client)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("=== 不重试 ===");
    match client(1)?.invoke(FLAKY_API, "fetch_no_retry", &[]).await {
        Ok(response) => info!("成功: {}", response.status),
        Err(e) => info!("失败: {}", e),
    }

    info!("=== 指数退避重试 ===");
    let start = Instant::now();
    let response = client(2)?.invoke(FLAKY_API, "fetch_with_backoff", &[]).await?;
    info!("状态 {}，耗时 {:?}", response.status, start.elapsed());

    info!("=== 自定义重试器 + 异步调用 ===");
    let client = Arc::new(client(2)?);
    let on_success = Argument::on_success(|response: &Response| {
        info!("回调收到 {} 字节", response.body.len());
    });
    let on_progress = Argument::on_progress(|progress: &Progress| {
        info!("进度 {}/{:?}", progress.current_bytes, progress.total_bytes);
    });
    let handle = client.spawn(FLAKY_API, "fetch_fixed", vec![on_success, on_progress]);
    let response = handle.await??;
    info!("异步调用完成: {}", response.status);

    Ok(())
}
