pub mod attributes;
pub mod cache;
pub mod chain;
pub mod traits;

pub use attributes::{AttributeBag, AttributeValue, InterceptorAttributes};
pub use cache::{InterceptorCache, InterceptorFactory};
pub use chain::InterceptorChain;
pub use traits::{Interceptor, InterceptorEntry, NoOpInterceptor};
