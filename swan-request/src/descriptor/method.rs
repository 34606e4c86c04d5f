use crate::config::Configuration;
use crate::descriptor::param::{ClassifiedParams, classify};
use crate::descriptor::resolver::{ResolvedSettings, resolve};
use crate::descriptor::{InterfaceDecl, MethodDecl};
use crate::error::{Result, SwanError};
use crate::interceptor::{InterceptorAttributes, InterceptorEntry};
use crate::parsing::Template;

/// 方法描述符
///
/// 注册时由接口声明和方法声明构建一次，之后不再修改，可在线程间共享。
#[derive(Debug)]
pub struct MethodDescriptor {
    interface: String,
    name: String,
    base_url: Option<Template>,
    url: Template,
    verb: Option<Template>,
    data_type: Option<Template>,
    base_headers: Vec<Template>,
    headers: Vec<Template>,
    data: Vec<Template>,
    params: ClassifiedParams,
    settings: ResolvedSettings,
    global_interceptors: Vec<InterceptorEntry>,
    base_interceptors: Vec<InterceptorEntry>,
    method_interceptors: Vec<InterceptorEntry>,
    /// 接口级属性在前，方法级属性在后
    attributes: Vec<InterceptorAttributes>,
    is_async: bool,
    progress_step: Option<u64>,
}

impl MethodDescriptor {
    /// 构建方法描述符
    ///
    /// # 参数
    /// * `interface` - 所属接口的声明（提供 base 配置）
    /// * `decl` - 方法声明
    /// * `config` - 全局配置
    ///
    /// # 返回值
    /// 构建好的描述符；请求声明个数不为一、拦截器/过滤器/变量未注册、
    /// 模板语法错误时返回错误
    pub fn build(interface: &InterfaceDecl, decl: &MethodDecl, config: &Configuration) -> Result<Self> {
        let request = match decl.requests.as_slice() {
            [request] => request,
            [] => {
                return Err(SwanError::config(format!(
                    "method \"{}.{}\" has no request declaration",
                    interface.name, decl.name
                )));
            }
            requests => {
                return Err(SwanError::config(format!(
                    "method \"{}.{}\" declares {} requests, expected exactly one",
                    interface.name,
                    decl.name,
                    requests.len()
                )));
            }
        };
        let base = &interface.base;

        let params = classify(&decl.name, &decl.params, config)?;
        let settings = resolve(request, base, config)?;

        let base_url = base
            .base_url
            .as_deref()
            .filter(|url| !url.trim().is_empty())
            .map(Template::parse)
            .transpose()?;
        let verb = optional_template(&request.verb)?;
        let data_type = optional_template(&request.data_type)?;
        let base_headers = parse_all(&base.headers)?;
        let headers = parse_all(&request.headers)?;
        let data = parse_all(&request.data)?;

        let mut attributes = Vec::new();
        for decl_attributes in base.attributes.iter().chain(&decl.attributes) {
            attributes.push(decl_attributes.parse()?);
        }

        // 拦截器顺序：全局、接口、方法
        let interceptors = config.interceptors();
        let global_interceptors = instantiate(config, &config.settings().interceptors)?;
        let mut base_ids = base.interceptors.clone();
        enlist_attribute_interceptors(&mut base_ids, &base.attributes, &[]);
        let base_interceptors = instantiate(config, &base_ids)?;
        let mut method_ids = Vec::new();
        let already_listed: Vec<String> = config
            .settings()
            .interceptors
            .iter()
            .chain(&base_ids)
            .chain(&request.interceptors)
            .cloned()
            .collect();
        enlist_attribute_interceptors(&mut method_ids, &decl.attributes, &already_listed);
        method_ids.extend(request.interceptors.iter().cloned());
        let method_interceptors = instantiate(config, &method_ids)?;
        log::debug!(
            "built {}.{} with {} interceptor(s), {} cached instance(s)",
            interface.name,
            decl.name,
            global_interceptors.len() + base_interceptors.len() + method_interceptors.len(),
            interceptors.size()
        );

        let descriptor = MethodDescriptor {
            interface: interface.name.clone(),
            name: decl.name.clone(),
            base_url,
            url: Template::parse(&request.url)?,
            verb,
            data_type,
            base_headers,
            headers,
            data,
            params,
            settings,
            global_interceptors,
            base_interceptors,
            method_interceptors,
            attributes,
            is_async: request.is_async,
            progress_step: request.progress_step.filter(|step| *step > 0),
        };
        descriptor.validate_references(config)?;
        Ok(descriptor)
    }

    /// 模板中的每个引用都必须是方法变量、合法的参数下标或全局变量
    fn validate_references(&self, config: &Configuration) -> Result<()> {
        for template in self.templates() {
            for name in template.references() {
                let known = self.params.variable(name).is_some()
                    || name.parse::<usize>().is_ok_and(|index| index < self.params.arity)
                    || config.has_variable(name);
                if !known {
                    return Err(SwanError::config(format!(
                        "variable \"{}\" referenced by \"{}\" in {}.{} is not declared",
                        name,
                        template.source(),
                        self.interface,
                        self.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn templates(&self) -> impl Iterator<Item = &Template> {
        let settings = &self.settings;
        self.base_url
            .iter()
            .chain(std::iter::once(&self.url))
            .chain(&self.verb)
            .chain(&self.data_type)
            .chain(&self.base_headers)
            .chain(&self.headers)
            .chain(&self.data)
            .chain(settings.content_type.templates())
            .chain(settings.content_encoding.templates())
            .chain(settings.user_agent.templates())
            .chain(settings.charset.templates())
            .chain(self.params.multiparts.iter().flat_map(|m| {
                std::iter::once(&m.name).chain(&m.file_name)
            }))
            .chain(self.attributes.iter().flat_map(|a| a.templates()))
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.params.arity
    }

    pub fn params(&self) -> &ClassifiedParams {
        &self.params
    }

    pub fn settings(&self) -> &ResolvedSettings {
        &self.settings
    }

    pub fn base_url(&self) -> Option<&Template> {
        self.base_url.as_ref()
    }

    pub fn url(&self) -> &Template {
        &self.url
    }

    pub fn verb(&self) -> Option<&Template> {
        self.verb.as_ref()
    }

    pub fn data_type(&self) -> Option<&Template> {
        self.data_type.as_ref()
    }

    pub fn base_headers(&self) -> &[Template] {
        &self.base_headers
    }

    pub fn headers(&self) -> &[Template] {
        &self.headers
    }

    pub fn data(&self) -> &[Template] {
        &self.data
    }

    pub fn attributes(&self) -> &[InterceptorAttributes] {
        &self.attributes
    }

    pub fn is_async(&self) -> bool {
        self.is_async
    }

    pub fn progress_step(&self) -> Option<u64> {
        self.progress_step
    }

    /// 按全局、接口、方法的顺序排列的拦截器
    pub fn interceptors(&self) -> impl Iterator<Item = &InterceptorEntry> {
        self.global_interceptors
            .iter()
            .chain(&self.base_interceptors)
            .chain(&self.method_interceptors)
    }

    pub fn interceptor_ids(&self) -> Vec<&str> {
        self.interceptors().map(|entry| entry.id.as_str()).collect()
    }
}

fn optional_template(text: &Option<String>) -> Result<Option<Template>> {
    text.as_deref()
        .filter(|t| !t.trim().is_empty())
        .map(Template::parse)
        .transpose()
}

fn parse_all(texts: &[String]) -> Result<Vec<Template>> {
    texts.iter().map(|text| Template::parse(text)).collect()
}

/// 属性声明所属的拦截器若尚未出现在任何作用域中，则加入列表
fn enlist_attribute_interceptors(
    ids: &mut Vec<String>,
    attributes: &[crate::descriptor::AttributesDecl],
    already_listed: &[String],
) {
    for decl in attributes {
        let listed = ids.contains(&decl.interceptor) || already_listed.contains(&decl.interceptor);
        if !listed {
            ids.push(decl.interceptor.clone());
        }
    }
}

fn instantiate(config: &Configuration, ids: &[String]) -> Result<Vec<InterceptorEntry>> {
    ids.iter()
        .map(|id| {
            let interceptor = config.interceptors().get_or_create(id)?;
            Ok(InterceptorEntry::new(id.clone(), interceptor))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{AttributesDecl, BaseMeta, ParamDecl, RequestMeta};
    use crate::interceptor::NoOpInterceptor;
    use std::sync::Arc;

    fn config() -> Configuration {
        Configuration::builder()
            .register_interceptor_default::<NoOpInterceptor>("global")
            .unwrap()
            .register_interceptor_default::<NoOpInterceptor>("base")
            .unwrap()
            .register_interceptor_default::<NoOpInterceptor>("method")
            .unwrap()
            .register_interceptor_default::<NoOpInterceptor>("auth")
            .unwrap()
            .interceptor("global")
            .variable("env", "test")
            .build()
            .unwrap()
    }

    fn interface(method: MethodDecl) -> InterfaceDecl {
        InterfaceDecl::new("UserApi")
            .base(BaseMeta::new().base_url("http://{env}.a.com").interceptor("base"))
            .method(method)
    }

    #[test]
    fn test_duplicate_request_declarations_rejected() {
        let method = MethodDecl::new("get_user")
            .request(RequestMeta::get("/users"))
            .request(RequestMeta::post("/users"));
        let err = MethodDescriptor::build(&interface(method.clone()), &method, &config()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("2 requests"));

        let empty = MethodDecl::new("get_user");
        assert!(MethodDescriptor::build(&interface(empty.clone()), &empty, &config()).is_err());
    }

    #[test]
    fn test_interceptor_order_and_attribute_enlisting() {
        let method = MethodDecl::new("get_user")
            .request(RequestMeta::get("/users").interceptor("method"))
            .attributes(AttributesDecl::new("auth").literal("scope", "read"))
            .attributes(AttributesDecl::new("base").literal("x", 1));
        let config = config();
        let descriptor = MethodDescriptor::build(&interface(method.clone()), &method, &config).unwrap();
        // base 已在接口级列出，不重复加入
        assert_eq!(descriptor.interceptor_ids(), vec!["global", "base", "auth", "method"]);

        // 同一配置中同一标识只实例化一次
        let again = MethodDescriptor::build(&interface(method.clone()), &method, &config).unwrap();
        let first = descriptor.interceptors().next().unwrap();
        let second = again.interceptors().next().unwrap();
        assert!(Arc::ptr_eq(&first.interceptor, &second.interceptor));
    }

    #[test]
    fn test_unregistered_interceptor_rejected() {
        let method = MethodDecl::new("get_user").request(RequestMeta::get("/users").interceptor("ghost"));
        let err = MethodDescriptor::build(&interface(method.clone()), &method, &config()).unwrap_err();
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_reference_validation() {
        let config = config();
        let ok = MethodDecl::new("get_user")
            .request(RequestMeta::get("/users/{id}?q={0}&env={env}"))
            .param(ParamDecl::variable("id"));
        assert!(MethodDescriptor::build(&interface(ok.clone()), &ok, &config).is_ok());

        let unknown = MethodDecl::new("get_user").request(RequestMeta::get("/users/{id}"));
        let err = MethodDescriptor::build(&interface(unknown.clone()), &unknown, &config).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("\"id\""));

        let out_of_range = MethodDecl::new("get_user")
            .request(RequestMeta::get("/users/{1}"))
            .param(ParamDecl::positional());
        assert!(MethodDescriptor::build(&interface(out_of_range.clone()), &out_of_range, &config).is_err());

        let in_header = MethodDecl::new("get_user")
            .request(RequestMeta::get("/users").header("Authorization: Bearer {token}"));
        assert!(MethodDescriptor::build(&interface(in_header.clone()), &in_header, &config).is_err());
    }

    #[test]
    fn test_malformed_template_is_template_error() {
        let method = MethodDecl::new("get_user").request(RequestMeta::get("/users/{id"));
        let err = MethodDescriptor::build(&interface(method.clone()), &method, &config()).unwrap_err();
        assert!(matches!(err, SwanError::Template { .. }));
    }
}
