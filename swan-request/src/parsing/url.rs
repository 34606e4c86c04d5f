use url::Url;

use crate::error::{Result, SwanError};
use crate::types::request::QueryPair;

/// 拆分后的 URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUrl {
    pub protocol: String,
    pub host: String,
    /// 协议默认端口时为 `None`
    pub port: Option<u16>,
    pub path: String,
    pub query: Vec<QueryPair>,
}

/// 拼接基础 URL 与方法 URL
///
/// 方法 URL 为绝对地址时直接使用；否则保证连接处恰好一个 `/`，
/// 以 `?` 开头的方法 URL 直接追加。
pub fn join_url(base: Option<&str>, url: &str) -> String {
    let url = url.trim();
    let base = match base.map(str::trim) {
        Some(base) if !base.is_empty() && !url.contains("://") => base,
        _ => return url.to_string(),
    };
    if url.is_empty() {
        return base.to_string();
    }
    if url.starts_with('?') {
        return format!("{}{}", base, url);
    }
    match (base.ends_with('/'), url.starts_with('/')) {
        (true, true) => format!("{}{}", base, &url[1..]),
        (false, false) => format!("{}/{}", base, url),
        _ => format!("{}{}", base, url),
    }
}

/// 解析渲染后的 URL
pub fn parse_url(text: &str) -> Result<ParsedUrl> {
    let parsed = Url::parse(text).map_err(|source| SwanError::Url {
        url: text.to_string(),
        source,
    })?;
    let host = match parsed.host_str() {
        Some(host) if !host.is_empty() => host.to_string(),
        _ => {
            return Err(SwanError::Url {
                url: text.to_string(),
                source: url::ParseError::EmptyHost,
            });
        }
    };

    Ok(ParsedUrl {
        protocol: parsed.scheme().to_string(),
        host,
        port: parsed.port(),
        path: parsed.path().to_string(),
        query: parsed.query().map(parse_query).unwrap_or_default(),
    })
}

/// 按 `&` 拆分、每段只在第一个 `=` 处拆分的键值对，不做解码
///
/// `a=1=2` 得到 `("a", "1=2")`，没有 `=` 的段值为 `None`，空段被忽略。
pub fn split_pairs(text: &str) -> Vec<QueryPair> {
    text.split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => QueryPair::new(name, Some(value.to_string())),
            None => QueryPair::new(segment, None),
        })
        .collect()
}

/// 解析查询串，名称与值做百分号解码（解码失败时保留原文）
pub fn parse_query(text: &str) -> Vec<QueryPair> {
    split_pairs(text)
        .into_iter()
        .map(|pair| QueryPair {
            name: decode(&pair.name),
            value: pair.value.as_deref().map(decode),
        })
        .collect()
}

/// 追加一个经过百分号编码的路径段
pub fn append_path_segment(path: &str, segment: &str) -> String {
    let encoded = urlencoding::encode(segment);
    if path.ends_with('/') {
        format!("{}{}", path, encoded)
    } else {
        format!("{}/{}", path, encoded)
    }
}

fn decode(text: &str) -> String {
    urlencoding::decode(text)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| text.to_string())
}
