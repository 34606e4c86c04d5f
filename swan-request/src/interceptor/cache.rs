use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, SwanError};
use crate::interceptor::Interceptor;

/// 拦截器工厂
pub type InterceptorFactory = Arc<dyn Fn() -> Arc<dyn Interceptor> + Send + Sync>;

/// 拦截器缓存管理器
///
/// 按标识注册拦截器工厂；同一标识在一个缓存中最多实例化一次，
/// 之后所有方法共享同一个 `Arc` 实例。
#[derive(Default)]
pub struct InterceptorCache {
    factories: HashMap<String, InterceptorFactory>,
    /// 已创建的实例，按标识索引
    instances: Mutex<HashMap<String, Arc<dyn Interceptor>>>,
}

impl InterceptorCache {
    /// 创建新的拦截器缓存
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册拦截器工厂，标识重复时返回配置错误
    pub fn register(&mut self, id: impl Into<String>, factory: InterceptorFactory) -> Result<()> {
        let id = id.into();
        if self.factories.contains_key(&id) {
            return Err(SwanError::config(format!(
                "interceptor \"{}\" is already registered",
                id
            )));
        }
        log::debug!("registering interceptor \"{}\"", id);
        self.factories.insert(id, factory);
        Ok(())
    }

    /// 以 `Default` 实现注册拦截器
    ///
    /// # 类型参数
    ///
    /// * `T` - 拦截器类型，必须实现 Interceptor + Default
    pub fn register_default<T>(&mut self, id: impl Into<String>) -> Result<()>
    where
        T: Interceptor + Default + 'static,
    {
        self.register(id, Arc::new(|| Arc::new(T::default()) as Arc<dyn Interceptor>))
    }

    /// 注册一个已创建的实例
    pub fn register_instance(
        &mut self,
        id: impl Into<String>,
        interceptor: Arc<dyn Interceptor>,
    ) -> Result<()> {
        self.register(id, Arc::new(move || interceptor.clone()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// 获取或创建拦截器
    ///
    /// # 返回值
    ///
    /// 返回拦截器的 Arc 引用；标识未注册时返回配置错误
    pub fn get_or_create(&self, id: &str) -> Result<Arc<dyn Interceptor>> {
        let factory = self.factories.get(id).ok_or_else(|| {
            SwanError::config(format!("interceptor \"{}\" is not registered", id))
        })?;
        let mut instances = self.instances.lock().unwrap_or_else(PoisonError::into_inner);
        let instance = instances
            .entry(id.to_string())
            .or_insert_with(|| factory())
            .clone();
        Ok(instance)
    }

    /// 获取已创建实例的数量（用于监控）
    pub fn size(&self) -> usize {
        self.instances
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
