pub mod args;
pub mod http;
pub mod request;
pub mod response;
pub mod retry;

pub use args::{Argument, FileData, OnError, OnProgress, OnSuccess};
pub use http::{ContentType, DataType, HttpMethod, ParamTarget};
pub use request::{Header, Headers, Multipart, NameValue, QueryPair, RequestBody, RequestDescriptor};
pub use response::{Progress, Response};
pub use retry::{BackOffRetryer, NoneRetryer, RetryPolicy, Retryer, RetryerFactory};
