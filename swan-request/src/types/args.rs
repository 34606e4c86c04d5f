use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Result, SwanError};
use crate::types::response::{Progress, Response};

/// 单次调用的实参
///
/// 与方法声明中的参数按位置一一对应。普通数据统一以 `serde_json::Value`
/// 承载，文件与回调各有专门的变体。
#[derive(Clone)]
pub enum Argument {
    Null,
    Value(Value),
    File(FileData),
    OnSuccess(OnSuccess),
    OnError(OnError),
    OnProgress(OnProgress),
}

impl Argument {
    /// 将任意可序列化对象（bean）转换为实参
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(Argument::Value)
            .map_err(|e| SwanError::conversion("argument serialization", e.into()))
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Argument::File(FileData::Path(path.into()))
    }

    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Argument::File(FileData::Bytes(data.into()))
    }

    pub fn on_success(callback: impl Fn(&Response) + Send + Sync + 'static) -> Self {
        Argument::OnSuccess(OnSuccess::new(callback))
    }

    pub fn on_error(callback: impl Fn(&SwanError) + Send + Sync + 'static) -> Self {
        Argument::OnError(OnError::new(callback))
    }

    pub fn on_progress(callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        Argument::OnProgress(OnProgress::new(callback))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Argument::Null | Argument::Value(Value::Null))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Argument::Value(value) => Some(value),
            _ => None,
        }
    }

    /// 实参的字符串形式，空值返回 `None`
    pub fn to_text(&self) -> Option<String> {
        match self {
            Argument::Value(value) => value_to_text(value),
            Argument::File(FileData::Path(path)) => Some(path.display().to_string()),
            _ => None,
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Argument::Null => "null",
            Argument::Value(_) => "value",
            Argument::File(_) => "file",
            Argument::OnSuccess(_) => "on_success callback",
            Argument::OnError(_) => "on_error callback",
            Argument::OnProgress(_) => "on_progress callback",
        }
    }
}

/// JSON 值的字符串形式：字符串不带引号，`null` 返回 `None`
pub fn value_to_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

impl fmt::Debug for Argument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Argument::Null => f.write_str("Null"),
            Argument::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Argument::File(file) => f.debug_tuple("File").field(file).finish(),
            other => write!(f, "<{}>", other.kind()),
        }
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::Value(value)
    }
}

impl From<FileData> for Argument {
    fn from(file: FileData) -> Self {
        Argument::File(file)
    }
}

impl<T: Into<Argument>> From<Option<T>> for Argument {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Argument::Null)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Argument {
                fn from(value: $ty) -> Self {
                    Argument::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(&str, String, bool, i32, i64, u16, u32, u64, usize, f64);

/// 上传文件的数据来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    /// 本地文件路径，由执行器在发送时读取
    Path(PathBuf),
    Bytes(Vec<u8>),
}

/// 成功回调
#[derive(Clone)]
pub struct OnSuccess(Arc<dyn Fn(&Response) + Send + Sync>);

impl OnSuccess {
    pub fn new(callback: impl Fn(&Response) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, response: &Response) {
        (self.0)(response)
    }
}

/// 失败回调
#[derive(Clone)]
pub struct OnError(Arc<dyn Fn(&SwanError) + Send + Sync>);

impl OnError {
    pub fn new(callback: impl Fn(&SwanError) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, error: &SwanError) {
        (self.0)(error)
    }
}

/// 进度回调
#[derive(Clone)]
pub struct OnProgress(Arc<dyn Fn(&Progress) + Send + Sync>);

impl OnProgress {
    pub fn new(callback: impl Fn(&Progress) + Send + Sync + 'static) -> Self {
        Self(Arc::new(callback))
    }

    pub fn call(&self, progress: &Progress) {
        (self.0)(progress)
    }
}

macro_rules! impl_callback_debug {
    ($($ty:ident),*) => {
        $(
            impl fmt::Debug for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(concat!(stringify!($ty), "(..)"))
                }
            }
        )*
    };
}

impl_callback_debug!(OnSuccess, OnError, OnProgress);
