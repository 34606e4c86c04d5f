use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE, USER_AGENT};
use serde_json::{Map, Value};

use crate::backend::{HttpExecutor, ProgressListener};
use crate::config::SslKeyStore;
use crate::types::args::value_to_text;
use crate::types::http::ContentType;
use crate::types::request::{Multipart, NameValue, RequestBody};
use crate::types::{FileData, Progress, RequestDescriptor, Response};

/// 基于 reqwest 的执行器
///
/// 每个证书库对应一个 `reqwest::Client`，首次使用时创建并缓存，
/// 不使用证书库的请求共用一个客户端。
pub struct ReqwestExecutor {
    connect_timeout: Option<Duration>,
    clients: Mutex<HashMap<Option<String>, reqwest::Client>>,
}

impl ReqwestExecutor {
    /// # 参数
    /// * `connect_timeout_ms` - 连接超时（毫秒），`None` 表示不限制
    pub fn new(connect_timeout_ms: Option<u64>) -> Self {
        Self {
            connect_timeout: connect_timeout_ms.map(Duration::from_millis),
            clients: Mutex::new(HashMap::new()),
        }
    }

    async fn client(&self, key_store: Option<&SslKeyStore>) -> anyhow::Result<reqwest::Client> {
        let key = key_store.map(|store| store.id.clone());
        let cached = {
            let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
            clients.get(&key).cloned()
        };
        if let Some(client) = cached {
            return Ok(client);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = self.connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(store) = key_store {
            let der = tokio::fs::read(&store.path)
                .await
                .with_context(|| format!("failed to read key store \"{}\" at {}", store.id, store.path.display()))?;
            let identity = reqwest::Identity::from_pkcs12_der(&der, store.password.as_deref().unwrap_or_default())
                .with_context(|| format!("invalid PKCS#12 key store \"{}\"", store.id))?;
            builder = builder.identity(identity);
            log::debug!("loaded key store \"{}\"", store.id);
        }
        let client = builder.build().context("failed to build reqwest client")?;

        let mut clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(clients.entry(key).or_insert(client).clone())
    }

    fn cached_clients(&self) -> usize {
        self.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for ReqwestExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestExecutor")
            .field("connect_timeout", &self.connect_timeout)
            .field("clients", &self.cached_clients())
            .finish()
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn execute(
        &self,
        request: &RequestDescriptor,
        progress: ProgressListener<'_>,
    ) -> anyhow::Result<Response> {
        let client = self.client(request.ssl_key_store.as_deref()).await?;
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())?;
        let url = build_url(request)?;

        let mut builder = client.request(method, url);
        for header in request.headers.iter() {
            builder = builder.header(&header.name, &header.value);
        }
        if let Some(content_type) = content_type_header(request) {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        if let Some(user_agent) = &request.user_agent {
            builder = builder.header(USER_AGENT, user_agent);
        }
        if let Some(encoding) = &request.content_encoding {
            builder = builder.header(CONTENT_ENCODING, encoding);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(Duration::from_millis(timeout));
        }

        builder = match &request.body {
            None => builder,
            Some(RequestBody::Raw(text)) => builder.body(text.clone()),
            Some(RequestBody::Form(pairs)) if is_json(request) => builder.body(serde_json::to_string(&fold_pairs(pairs))?),
            Some(RequestBody::Form(pairs)) => builder.body(form_encode(pairs)),
            Some(RequestBody::Objects(objects)) => builder.body(serde_json::to_string(&objects_body(objects))?),
            Some(RequestBody::Multipart { fields, parts }) => builder.multipart(multipart_form(fields, parts).await?),
        };

        let mut response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let total = response.content_length();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            progress(Progress {
                current_bytes: body.len() as u64,
                total_bytes: total,
            });
        }

        Ok(Response { status, headers, body })
    }
}

fn build_url(request: &RequestDescriptor) -> anyhow::Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(&request.url()).with_context(|| format!("invalid url {}", request.url()))?;
    if !request.query.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for pair in &request.query {
            match &pair.value {
                Some(value) => pairs.append_pair(&pair.name, value),
                None => pairs.append_key_only(&pair.name),
            };
        }
    }
    Ok(url)
}

/// 请求体的内容类型，缺省时按请求体推断；multipart 的边界由 reqwest 生成
fn content_type_header(request: &RequestDescriptor) -> Option<String> {
    let content_type = match (&request.content_type, &request.body) {
        (_, Some(RequestBody::Multipart { .. })) => return None,
        (Some(content_type), _) => content_type.clone(),
        (None, Some(RequestBody::Form(_))) => ContentType::FormUrlEncoded.as_str().to_string(),
        (None, Some(RequestBody::Objects(_))) => ContentType::Json.as_str().to_string(),
        (None, _) => return None,
    };
    if content_type.to_ascii_lowercase().contains("charset=") {
        Some(content_type)
    } else {
        Some(format!("{}; charset={}", content_type, request.charset))
    }
}

fn is_json(request: &RequestDescriptor) -> bool {
    request
        .content_type
        .as_deref()
        .and_then(ContentType::detect)
        .is_some_and(|content_type| content_type == ContentType::Json)
}

fn fold_pairs(pairs: &[NameValue]) -> Value {
    let map: Map<String, Value> = pairs
        .iter()
        .map(|pair| (pair.name.clone(), pair.value.clone()))
        .collect();
    Value::Object(map)
}

fn form_encode(pairs: &[NameValue]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for pair in pairs {
        serializer.append_pair(&pair.name, &value_to_text(&pair.value).unwrap_or_default());
    }
    serializer.finish()
}

/// 单个对象直接发送，多个对象组成数组
fn objects_body(objects: &[Value]) -> Value {
    match objects {
        [single] => single.clone(),
        many => Value::Array(many.to_vec()),
    }
}

async fn multipart_form(fields: &[NameValue], parts: &[Multipart]) -> anyhow::Result<reqwest::multipart::Form> {
    let mut form = reqwest::multipart::Form::new();
    for field in fields {
        form = form.text(field.name.clone(), value_to_text(&field.value).unwrap_or_default());
    }
    for part in parts {
        let bytes = match &part.data {
            FileData::Path(path) => tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read upload file {}", path.display()))?,
            FileData::Bytes(bytes) => bytes.clone(),
        };
        let mut file = reqwest::multipart::Part::bytes(bytes);
        if let Some(file_name) = &part.file_name {
            file = file.file_name(file_name.clone());
        }
        form = form.part(part.name.clone(), file);
    }
    Ok(form)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HttpMethod, QueryPair};
    use serde_json::json;

    fn post() -> RequestDescriptor {
        RequestDescriptor::new("Api", "save", HttpMethod::Post, "https", "a.com")
    }

    #[test]
    fn test_content_type_gets_charset() {
        let mut request = post();
        request.body = Some(RequestBody::Form(vec![NameValue::new("a", 1)]));
        assert_eq!(
            content_type_header(&request).as_deref(),
            Some("application/x-www-form-urlencoded; charset=UTF-8")
        );

        request.content_type = Some("application/json; charset=GBK".to_string());
        assert_eq!(
            content_type_header(&request).as_deref(),
            Some("application/json; charset=GBK")
        );
        assert!(is_json(&request));

        request.body = Some(RequestBody::Multipart {
            fields: vec![],
            parts: vec![],
        });
        assert_eq!(content_type_header(&request), None);

        request.body = None;
        request.content_type = None;
        assert_eq!(content_type_header(&request), None);
    }

    #[test]
    fn test_body_encodings() {
        let pairs = vec![NameValue::new("q", "a b&c"), NameValue::new("n", 1), NameValue::new("x", Value::Null)];
        assert_eq!(form_encode(&pairs), "q=a+b%26c&n=1&x=");
        assert_eq!(fold_pairs(&pairs), json!({"q": "a b&c", "n": 1, "x": null}));

        assert_eq!(objects_body(&[json!({"a": 1})]), json!({"a": 1}));
        assert_eq!(objects_body(&[json!(1), json!([2])]), json!([1, [2]]));
    }

    #[test]
    fn test_build_url_appends_query() {
        let mut request = post();
        request.path = "/a%20b".to_string();
        request.query.push(QueryPair::new("q", Some("x y".to_string())));
        request.query.push(QueryPair::new("flag", None));
        let url = build_url(&request).unwrap();
        assert_eq!(url.as_str(), "https://a.com/a%20b?q=x+y&flag");
    }

    #[tokio::test]
    async fn test_clients_are_cached_per_key_store() {
        let executor = ReqwestExecutor::new(Some(2000));
        executor.client(None).await.unwrap();
        executor.client(None).await.unwrap();
        assert_eq!(executor.cached_clients(), 1);

        let missing = SslKeyStore::new("missing", "/nonexistent/client.p12", None);
        let err = executor.client(Some(&missing)).await.unwrap_err();
        assert!(err.to_string().contains("missing"));
        assert_eq!(executor.cached_clients(), 1);
    }

    #[tokio::test]
    async fn test_multipart_reads_bytes() {
        let parts = vec![Multipart {
            name: "file".to_string(),
            file_name: Some("a.txt".to_string()),
            data: FileData::Bytes(b"hello".to_vec()),
        }];
        let form = multipart_form(&[NameValue::new("owner", "bob")], &parts).await.unwrap();
        assert!(!form.boundary().is_empty());

        let missing = vec![Multipart {
            name: "file".to_string(),
            file_name: None,
            data: FileData::Path("/nonexistent/upload.bin".into()),
        }];
        assert!(multipart_form(&[], &missing).await.is_err());
    }
}
