use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::Deserialize;
use swan_request::{
    Argument, AttributesDecl, BaseMeta, Client, Configuration, Interceptor, InterfaceDecl,
    MethodDecl, MethodDescriptor, ParamDecl, RequestDescriptor, RequestMeta, Response, SwanError,
};

/// 用户数据结构
#[derive(Debug, Deserialize)]
struct User {
    id: u32,
    name: String,
}

/// 认证拦截器 - 从拦截器属性读取令牌并写入请求头
#[derive(Default)]
struct AuthInterceptor;

impl Interceptor for AuthInterceptor {
    fn before_execute(&self, request: &mut RequestDescriptor) -> bool {
        match request.interceptor_attribute_text("auth", "token") {
            Some(token) => {
                println!("🔐 AuthInterceptor: 添加认证头部");
                request.headers.set("Authorization", format!("Bearer {}", token));
                true
            }
            None => {
                println!("🔐 AuthInterceptor: 缺少令牌，放弃请求");
                false
            }
        }
    }
}

/// 日志拦截器 - 记录请求和响应信息
#[derive(Default)]
struct LoggingInterceptor {
    completed: AtomicUsize,
}

impl Interceptor for LoggingInterceptor {
    fn on_invoke_method(&self, request: &mut RequestDescriptor, method: &MethodDescriptor, args: &[Argument]) {
        println!(
            "📝 LoggingInterceptor: 调用 {}.{}，{} 个参数",
            method.interface(),
            method.name(),
            args.len()
        );
        request.headers.set("X-Request-Method", method.name());
    }

    fn after_execute(&self, request: &RequestDescriptor, response: &Response) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        println!(
            "📝 LoggingInterceptor: {} {} -> {}",
            request.method.as_str(),
            request.full_url(),
            response.status
        );
    }

    fn on_error(&self, request: &RequestDescriptor, error: &SwanError) {
        println!("📝 LoggingInterceptor: {} 失败: {}", request.method_name, error);
    }
}

const USER_API: &str = "UserApi";

fn user_api() -> InterfaceDecl {
    InterfaceDecl::new(USER_API)
        .base(BaseMeta::new().base_url("https://jsonplaceholder.typicode.com"))
        .method(
            // 声明属性即把 auth 拦截器挂到该方法上
            MethodDecl::new("get_user")
                .request(RequestMeta::get("/users/{0}"))
                .param(ParamDecl::positional())
                .attributes(AttributesDecl::new("auth").template("token", "{token}-{0}")),
        )
        .method(
            MethodDecl::new("get_user_with_logging")
                .request(RequestMeta::get("/users/{0}").interceptor("logging"))
                .param(ParamDecl::positional()),
        )
        .method(
            MethodDecl::new("get_user_without_token")
                .request(RequestMeta::get("/users/{0}").interceptor("auth"))
                .param(ParamDecl::positional()),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let logging = Arc::new(LoggingInterceptor::default());
    let config = Configuration::builder()
        .variable("token", "demo-token")
        .register_interceptor_default::<AuthInterceptor>("auth")?
        .register_interceptor_instance("logging", logging.clone())?
        .build()?;
    let mut client = Client::new(config);
    client.register(&user_api())?;

    println!("=== 拦截器属性 ===");
    let user: User = client.invoke_json(USER_API, "get_user", &[Argument::from(1)]).await?;
    println!("获取用户: #{} {}", user.id, user.name);

    println!("\n=== 方法级日志拦截器 ===");
    let user: User = client
        .invoke_json(USER_API, "get_user_with_logging", &[Argument::from(2)])
        .await?;
    println!("获取用户: #{} {}", user.id, user.name);

    println!("\n=== 拦截器放弃请求 ===");
    match client.invoke(USER_API, "get_user_without_token", &[Argument::from(3)]).await {
        Ok(response) => println!("意外成功: {}", response.status),
        Err(SwanError::Refused(id)) => println!("请求被拦截器 \"{}\" 放弃", id),
        Err(e) => println!("请求失败: {}", e),
    }

    println!("\n日志拦截器共记录 {} 个响应", logging.completed.load(Ordering::Relaxed));
    Ok(())
}
