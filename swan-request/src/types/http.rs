use heck::ToSnakeCase;

/// HTTP 方法枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
    Trace,
}

impl HttpMethod {
    /// 返回HTTP方法的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }

    /// 按名称查找请求方法（忽略大小写）
    pub fn find(name: &str) -> Option<Self> {
        let method = match name.trim().to_ascii_uppercase().as_str() {
            "GET" => HttpMethod::Get,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "PATCH" => HttpMethod::Patch,
            "DELETE" => HttpMethod::Delete,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "TRACE" => HttpMethod::Trace,
            _ => return None,
        };
        Some(method)
    }

    /// 根据方法命名约定推断请求方法
    ///
    /// `get_user`、`getUser`、`deleteItem` 等名称取第一个单词匹配，
    /// 无法匹配时返回 `None`。
    pub fn from_method_name(method_name: &str) -> Option<Self> {
        let snake = method_name.to_snake_case();
        snake.split('_').next().and_then(Self::find)
    }

    /// 参数未指定目标时的默认目标
    pub fn default_target(&self) -> ParamTarget {
        if self.allows_body() {
            ParamTarget::Body
        } else {
            ParamTarget::Query
        }
    }

    /// 是否允许携带请求体
    pub fn allows_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }

    /// 判断HTTP方法是否幂等
    pub fn is_idempotent(&self) -> bool {
        !matches!(self, HttpMethod::Post | HttpMethod::Patch)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 参数绑定目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ParamTarget {
    Query,
    Header,
    Body,
    Path,
    /// 未指定，按请求方法取默认目标
    #[default]
    Unresolved,
}

impl ParamTarget {
    /// 将未指定的目标解析为请求方法的默认目标
    pub fn resolve(self, method: HttpMethod) -> ParamTarget {
        match self {
            ParamTarget::Unresolved => method.default_target(),
            target => target,
        }
    }
}

/// 响应数据类型标签
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataType {
    #[default]
    Text,
    Json,
    Xml,
    Binary,
    Auto,
}

impl DataType {
    /// 按标签查找（忽略大小写），未知标签返回 `None`
    pub fn from_tag(tag: &str) -> Option<Self> {
        let data_type = match tag.trim().to_ascii_uppercase().as_str() {
            "TEXT" => DataType::Text,
            "JSON" => DataType::Json,
            "XML" => DataType::Xml,
            "BINARY" => DataType::Binary,
            "AUTO" => DataType::Auto,
            _ => return None,
        };
        Some(data_type)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "TEXT",
            DataType::Json => "JSON",
            DataType::Xml => "XML",
            DataType::Binary => "BINARY",
            DataType::Auto => "AUTO",
        }
    }
}

/// 内容类型枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Json,
    FormUrlEncoded,
    FormMultipart,
    Text,
}

impl ContentType {
    pub const MULTIPART_FORM_DATA: &'static str = "multipart/form-data";

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Json => "application/json",
            ContentType::FormUrlEncoded => "application/x-www-form-urlencoded",
            ContentType::FormMultipart => Self::MULTIPART_FORM_DATA,
            ContentType::Text => "text/plain",
        }
    }

    /// 从 Content-Type 头部值中识别内容类型（忽略参数部分）
    pub fn detect(header_value: &str) -> Option<Self> {
        let mime = header_value
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match mime.as_str() {
            "application/x-www-form-urlencoded" => Some(ContentType::FormUrlEncoded),
            "multipart/form-data" => Some(ContentType::FormMultipart),
            "text/plain" => Some(ContentType::Text),
            m if m == "application/json" || m.ends_with("+json") => Some(ContentType::Json),
            _ => None,
        }
    }
}
