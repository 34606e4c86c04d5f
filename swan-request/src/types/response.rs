use serde::de::DeserializeOwned;

/// 执行器返回的响应
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 按名称查找响应头（忽略大小写）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// 传输进度
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub current_bytes: u64,
    pub total_bytes: Option<u64>,
}

impl Progress {
    pub fn rate(&self) -> Option<f64> {
        match self.total_bytes {
            Some(0) => Some(1.0),
            Some(total) => Some(self.current_bytes as f64 / total as f64),
            None => None,
        }
    }

    pub fn is_done(&self) -> bool {
        self.total_bytes
            .is_some_and(|total| self.current_bytes >= total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Payload {
        id: u32,
    }

    #[test]
    fn test_response_helpers() {
        let response = Response::new(201, r#"{"id": 7}"#).with_header("Content-Type", "application/json");
        assert!(response.is_success());
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.json::<Payload>().unwrap(), Payload { id: 7 });
        assert!(!Response::new(404, "").is_success());
    }

    #[test]
    fn test_progress_rate() {
        let progress = Progress {
            current_bytes: 50,
            total_bytes: Some(200),
        };
        assert_eq!(progress.rate(), Some(0.25));
        assert!(!progress.is_done());
        let unknown = Progress {
            current_bytes: 10,
            total_bytes: None,
        };
        assert_eq!(unknown.rate(), None);
    }
}
