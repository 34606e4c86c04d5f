use serde::{Deserialize, Serialize};
use swan_request::{
    Argument, BaseMeta, Client, Configuration, InterfaceDecl, MethodDecl, ParamDecl, ParamShape,
    RequestMeta,
};

/// 用户数据结构
#[derive(Debug, Serialize, Deserialize)]
struct User {
    id: u32,
    name: String,
    email: String,
}

/// 创建用户请求
#[derive(Serialize)]
struct CreateUserRequest {
    name: String,
    email: String,
}

#[derive(Debug, Deserialize)]
struct Post {
    id: u32,
    title: String,
}

const USER_API: &str = "UserApi";

/// 用户接口声明
fn user_api() -> InterfaceDecl {
    InterfaceDecl::new(USER_API)
        .base(
            BaseMeta::new()
                .base_url("{base}")
                .header("Accept: application/json")
                .user_agent("swan-request-demo"),
        )
        .method(
            MethodDecl::new("get_user")
                .request(RequestMeta::get("/users/{0}"))
                .param(ParamDecl::positional()),
        )
        .method(
            MethodDecl::new("list_posts")
                .request(RequestMeta::get("/posts"))
                .param(ParamDecl::query("userId")),
        )
        .method(
            MethodDecl::new("create_user")
                .request(RequestMeta::post("/users").content_type("application/json"))
                .param(ParamDecl::object(ParamShape::Bean)),
        )
}

/// 手写的类型化客户端，每个方法只负责把参数交给 `Client::invoke`
struct UserApiClient {
    client: Client,
}

impl UserApiClient {
    fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_user(&self, id: u32) -> anyhow::Result<User> {
        Ok(self.client.invoke_json(USER_API, "get_user", &[Argument::from(id)]).await?)
    }

    async fn list_posts(&self, user_id: u32) -> anyhow::Result<Vec<Post>> {
        Ok(self
            .client
            .invoke_json(USER_API, "list_posts", &[Argument::from(user_id)])
            .await?)
    }

    async fn create_user(&self, request: &CreateUserRequest) -> anyhow::Result<User> {
        let body = Argument::json(request)?;
        Ok(self.client.invoke_json(USER_API, "create_user", &[body]).await?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = Configuration::builder()
        .variable("base", "https://jsonplaceholder.typicode.com")
        .timeout(10_000)
        .log_enabled(true)
        .build()?;
    let mut client = Client::new(config);
    client.register(&user_api())?;
    let api = UserApiClient::new(client);

    println!("=== Swan Request 基础用法 ===");

    match api.get_user(1).await {
        Ok(user) => println!("获取用户: {:?}", user),
        Err(e) => println!("获取用户失败: {}", e),
    }

    match api.list_posts(1).await {
        Ok(posts) => {
            println!("用户 1 共有 {} 篇文章", posts.len());
            if let Some(first) = posts.first() {
                println!("第一篇: #{} {}", first.id, first.title);
            }
        }
        Err(e) => println!("获取文章失败: {}", e),
    }

    let request = CreateUserRequest {
        name: "Swan".to_string(),
        email: "swan@example.com".to_string(),
    };
    match api.create_user(&request).await {
        Ok(user) => println!("创建用户: {:?}", user),
        Err(e) => println!("创建用户失败: {}", e),
    }

    Ok(())
}
