use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::config::Configuration;
use crate::descriptor::{InterfaceDecl, MethodDescriptor};
use crate::error::{Result, SwanError};

/// 方法描述符的键：接口名 + 方法名
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodKey {
    pub interface: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
        }
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.interface, self.method)
    }
}

/// 已注册接口的描述符表
///
/// 注册只发生在启动阶段；描述符以 `Arc` 共享，调用期只读。
#[derive(Debug, Default)]
pub struct DescriptorRegistry {
    descriptors: HashMap<MethodKey, Arc<MethodDescriptor>>,
}

impl DescriptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册接口的全部方法
    ///
    /// 任一方法构建失败时整个接口都不注册。
    pub fn register(&mut self, interface: &InterfaceDecl, config: &Configuration) -> Result<()> {
        if self.contains_interface(&interface.name) {
            return Err(SwanError::config(format!(
                "interface \"{}\" is already registered",
                interface.name
            )));
        }

        let mut built = HashMap::with_capacity(interface.methods.len());
        for method in &interface.methods {
            let key = MethodKey::new(&interface.name, &method.name);
            let descriptor = MethodDescriptor::build(interface, method, config)?;
            if built.insert(key.clone(), Arc::new(descriptor)).is_some() {
                return Err(SwanError::config(format!("method \"{}\" is declared twice", key)));
            }
        }

        log::debug!(
            "registered interface {} with {} method(s)",
            interface.name,
            built.len()
        );
        self.descriptors.extend(built);
        Ok(())
    }

    pub fn get(&self, interface: &str, method: &str) -> Result<Arc<MethodDescriptor>> {
        self.descriptors
            .get(&MethodKey::new(interface, method))
            .cloned()
            .ok_or_else(|| SwanError::config(format!("method \"{}.{}\" is not registered", interface, method)))
    }

    pub fn contains_interface(&self, interface: &str) -> bool {
        self.descriptors.keys().any(|key| key.interface == interface)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MethodDecl, RequestMeta};

    #[test]
    fn test_register_and_lookup() {
        let config = Configuration::builder().build().unwrap();
        let mut registry = DescriptorRegistry::new();
        let api = InterfaceDecl::new("UserApi")
            .method(MethodDecl::new("get_user").request(RequestMeta::get("http://a.com/users")))
            .method(MethodDecl::new("delete_user").request(RequestMeta::delete("http://a.com/users")));
        registry.register(&api, &config).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.get("UserApi", "get_user").unwrap().name(), "get_user");
        assert!(registry.get("UserApi", "missing").is_err());
        assert!(registry.register(&api, &config).unwrap_err().is_configuration());
    }

    #[test]
    fn test_failed_interface_is_not_registered() {
        let config = Configuration::builder().build().unwrap();
        let mut registry = DescriptorRegistry::new();
        let api = InterfaceDecl::new("UserApi")
            .method(MethodDecl::new("ok").request(RequestMeta::get("http://a.com")))
            .method(MethodDecl::new("ok").request(RequestMeta::get("http://b.com")));
        assert!(registry.register(&api, &config).is_err());
        assert!(registry.is_empty());
        assert_eq!(MethodKey::new("UserApi", "ok").to_string(), "UserApi.ok");
    }
}
