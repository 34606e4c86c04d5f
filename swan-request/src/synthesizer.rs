//! 请求合成
//!
//! 把注册期构建好的 `MethodDescriptor` 与一次调用的实参合成为
//! 与后端无关的 `RequestDescriptor`。合成是纯函数：不做网络或文件 I/O，
//! 不修改描述符，可在任意线程并发调用。

use std::collections::HashMap;

use anyhow::anyhow;
use serde_json::{Map, Value};

use crate::config::Configuration;
use crate::descriptor::{CallbackKind, ExpansionMode, MethodDescriptor, ParameterBinding};
use crate::error::{Result, SwanError};
use crate::parsing::url::append_path_segment;
use crate::parsing::{VariableScope, join_url, parse_query, parse_url};
use crate::types::args::value_to_text;
use crate::types::http::{ContentType, DataType, HttpMethod, ParamTarget};
use crate::types::request::{Multipart, NameValue, QueryPair, RequestBody, RequestDescriptor};
use crate::types::{Argument, FileData};

/// 单次调用的变量作用域
///
/// 查找顺序：方法变量、参数下标、全局变量。
struct CallScope<'a> {
    variables: HashMap<&'a str, Option<String>>,
    args: &'a [Argument],
    config: &'a Configuration,
}

impl<'a> CallScope<'a> {
    fn new(descriptor: &'a MethodDescriptor, args: &'a [Argument], config: &'a Configuration) -> Result<Self> {
        let mut variables = HashMap::new();
        for variable in &descriptor.params().variables {
            let argument = &args[variable.index];
            let text = match argument {
                Argument::Value(value) if !variable.filters.is_empty() => {
                    let filtered = variable.filters.apply(config, value.clone())?;
                    value_to_text(&filtered)
                }
                other => other.to_text(),
            };
            variables.insert(variable.name.as_str(), text);
        }
        Ok(Self {
            variables,
            args,
            config,
        })
    }
}

impl VariableScope for CallScope<'_> {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        if let Some(value) = self.variables.get(name) {
            return Ok(value.clone());
        }
        if let Some(argument) = name.parse::<usize>().ok().and_then(|index| self.args.get(index)) {
            return Ok(argument.to_text());
        }
        self.config.resolve(name)
    }
}

/// 合成过程中尚未归入请求体的数据
#[derive(Default)]
struct PendingBody {
    pairs: Vec<NameValue>,
    objects: Vec<Value>,
    parts: Vec<Multipart>,
}

/// 合成请求
///
/// # 参数
/// * `descriptor` - 注册期构建的方法描述符
/// * `args` - 与参数声明按位置对应的实参
/// * `config` - 构建描述符时使用的全局配置
///
/// # 返回值
/// 完整的请求描述；实参个数不符、URL 非法、请求方法或数据类型未知、
/// 过滤器或转换器失败时返回错误
pub fn synthesize(
    descriptor: &MethodDescriptor,
    args: &[Argument],
    config: &Configuration,
) -> Result<RequestDescriptor> {
    if args.len() != descriptor.arity() {
        return Err(SwanError::ArgumentCount {
            method: format!("{}.{}", descriptor.interface(), descriptor.name()),
            expected: descriptor.arity(),
            actual: args.len(),
        });
    }

    let scope = CallScope::new(descriptor, args, config)?;
    let settings = descriptor.settings();

    let method = resolve_method(descriptor, &scope)?;

    let base_url = descriptor.base_url().map(|t| t.render(&scope)).transpose()?;
    let url = descriptor.url().render(&scope)?;
    let parsed = parse_url(&join_url(base_url.as_deref(), &url))?;

    let mut request = RequestDescriptor::new(
        descriptor.interface(),
        descriptor.name(),
        method,
        parsed.protocol,
        parsed.host,
    );
    request.port = parsed.port;
    request.path = parsed.path;
    request.query = parsed.query;

    if let Some(charset) = settings.charset.render(&scope)? {
        request.charset = charset;
    }
    request.content_type = settings.content_type.render(&scope)?;
    request.content_encoding = settings.content_encoding.render(&scope)?;
    request.user_agent = settings.user_agent.render(&scope)?;

    let mut body = PendingBody::default();
    for binding in &descriptor.params().bindings {
        bind_parameter(&mut request, &mut body, binding, &args[binding.index], config)?;
    }

    build_multiparts(descriptor, args, &scope, &mut body)?;
    apply_defaults(descriptor, &scope, config, &mut request, &mut body)?;

    let data = render_data(descriptor, &scope)?;
    for template in descriptor.headers() {
        let text = template.render(&scope)?;
        match split_header(&text) {
            Some((name, value)) => request.headers.set(name, value),
            None => log::warn!("ignoring header template \"{}\" without a name", template.source()),
        }
    }

    if let Some(content_type) = request.headers.remove("Content-Type") {
        if request.content_type.is_none() {
            request.content_type = Some(content_type);
        }
    }
    if !body.parts.is_empty() && request.content_type.is_none() && request.method.allows_body() {
        request.content_type = Some(ContentType::MULTIPART_FORM_DATA.to_string());
    }

    request.body = assemble_body(&mut request, body, data);

    request.timeout = settings.timeout;
    request.retry = settings.retry.clone();
    request.ssl_key_store = settings.key_store.clone();
    request.log_enabled = settings.log_enabled;
    request.is_async = descriptor.is_async();
    request.progress_step = descriptor.progress_step();

    attach_callbacks(descriptor, args, &mut request)?;

    let tag = descriptor
        .data_type()
        .map(|t| t.render(&scope))
        .transpose()?
        .unwrap_or_default();
    request.data_type = if tag.trim().is_empty() {
        DataType::Text
    } else {
        DataType::from_tag(&tag).ok_or_else(|| SwanError::UnsupportedType {
            kind: "data type",
            value: tag.trim().to_string(),
        })?
    };

    for attributes in descriptor.attributes() {
        let values = attributes.render(&scope)?;
        request.attributes.merge(&attributes.interceptor, values);
    }
    request.interceptors = descriptor.interceptors().cloned().collect();

    // 工厂只接收请求本身，因此放在其余字段都就绪之后
    request.retryer = Some((settings.retryer_factory)(&request));

    if request.log_enabled {
        log::debug!(
            "synthesized {}.{}: {} {}",
            request.interface,
            request.method_name,
            request.method,
            request.full_url()
        );
    }
    Ok(request)
}

/// 请求方法：模板优先，空白时按方法名推断，都不匹配时为 GET
fn resolve_method(descriptor: &MethodDescriptor, scope: &CallScope<'_>) -> Result<HttpMethod> {
    let verb = match descriptor.verb() {
        Some(template) => template.render(scope)?,
        None => String::new(),
    };
    if verb.trim().is_empty() {
        return Ok(HttpMethod::from_method_name(descriptor.name()).unwrap_or(HttpMethod::Get));
    }
    HttpMethod::find(&verb).ok_or_else(|| SwanError::UnsupportedType {
        kind: "http method",
        value: verb.trim().to_string(),
    })
}

/// 实参作为数据参与合成时的值
fn data_value(index: usize, argument: &Argument) -> Result<Value> {
    match argument {
        Argument::Null => Ok(Value::Null),
        Argument::Value(value) => Ok(value.clone()),
        Argument::File(FileData::Path(path)) => Ok(Value::String(path.display().to_string())),
        other => Err(SwanError::conversion(
            format!("argument #{}", index),
            anyhow!("{} cannot be bound as request data", other.kind()),
        )),
    }
}

fn bind_parameter(
    request: &mut RequestDescriptor,
    body: &mut PendingBody,
    binding: &ParameterBinding,
    argument: &Argument,
    config: &Configuration,
) -> Result<()> {
    let target = binding.target.resolve(request.method);
    let value = data_value(binding.index, argument)?;
    let context = || format!("parameter #{}", binding.index);

    match binding.mode {
        ExpansionMode::Scalar => {
            // 空值不产生任何数据
            match &binding.name {
                Some(name) if !value.is_null() => route_pair(request, body, target, name, value),
                _ => {}
            }
        }
        ExpansionMode::List => push_object(request, body, target, value),
        ExpansionMode::Map => match value {
            Value::Null => {}
            Value::Object(map) => route_entries(request, body, target, map),
            other => {
                return Err(SwanError::conversion(
                    context(),
                    anyhow!("expected a map, got {}", other),
                ));
            }
        },
        ExpansionMode::Bean => {
            if !value.is_null() {
                let properties = config
                    .json_converter()
                    .to_property_map(&value)
                    .map_err(|e| SwanError::conversion(context(), e))?;
                route_entries(request, body, target, properties);
            }
        }
        ExpansionMode::Auto => match value {
            Value::Null => {}
            Value::Object(map) => route_entries(request, body, target, map),
            other => push_object(request, body, target, other),
        },
        ExpansionMode::Json => {
            let name = binding.json_name().unwrap_or_default();
            let filtered = binding.filters.apply(config, value)?;
            let encoded = match filtered {
                Value::Null => String::new(),
                Value::String(text) if binding.filters_encode_json() => text,
                other => config
                    .json_converter()
                    .encode_to_string(&other)
                    .map_err(|e| SwanError::conversion(context(), e))?,
            };
            route_pair(request, body, target, name, Value::String(encoded));
        }
        ExpansionMode::Filtered => {
            let filtered = binding.filters.apply(config, value)?;
            match (&binding.name, filtered) {
                (Some(name), filtered) => route_pair(request, body, target, name, filtered),
                (None, Value::Object(map)) => route_entries(request, body, target, map),
                (None, Value::Null) => {}
                (None, other) => push_object(request, body, target, other),
            }
        }
    }
    Ok(())
}

/// 按目标放置一个键值对
fn route_pair(
    request: &mut RequestDescriptor,
    body: &mut PendingBody,
    target: ParamTarget,
    name: &str,
    value: Value,
) {
    match target {
        ParamTarget::Query => {
            let text = value_to_text(&value).unwrap_or_default();
            request.query.push(QueryPair::new(name, Some(text)));
        }
        ParamTarget::Header => {
            if let Some(text) = value_to_text(&value) {
                request.headers.set(name, text);
            }
        }
        ParamTarget::Path => {
            if let Some(text) = value_to_text(&value) {
                request.path = append_path_segment(&request.path, &text);
            }
        }
        ParamTarget::Body | ParamTarget::Unresolved => body.pairs.push(NameValue::new(name, value)),
    }
}

/// 展开对象的每个非空属性
fn route_entries(
    request: &mut RequestDescriptor,
    body: &mut PendingBody,
    target: ParamTarget,
    entries: Map<String, Value>,
) {
    for (name, value) in entries {
        if !value.is_null() {
            route_pair(request, body, target, &name, value);
        }
    }
}

/// 无名称的基础类型或列表只能作为请求体中的对象
fn push_object(request: &RequestDescriptor, body: &mut PendingBody, target: ParamTarget, value: Value) {
    if value.is_null() {
        return;
    }
    match target {
        ParamTarget::Body | ParamTarget::Unresolved => body.objects.push(value),
        other => log::warn!(
            "{}.{}: unnamed {:?} parameter cannot be bound to {:?}, ignored",
            request.interface,
            request.method_name,
            value,
            other
        ),
    }
}

fn build_multiparts(
    descriptor: &MethodDescriptor,
    args: &[Argument],
    scope: &CallScope<'_>,
    body: &mut PendingBody,
) -> Result<()> {
    for factory in &descriptor.params().multiparts {
        let argument = &args[factory.index];
        if argument.is_null() {
            continue;
        }
        let name = factory.name.render(scope)?;
        let file_name = factory
            .file_name
            .as_ref()
            .map(|t| t.render(scope))
            .transpose()?
            .filter(|n| !n.trim().is_empty());

        let files = match argument {
            Argument::File(data) => vec![data.clone()],
            Argument::Value(Value::String(path)) => vec![FileData::Path(path.into())],
            Argument::Value(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(path) => Ok(FileData::Path(path.into())),
                    other => Err(SwanError::conversion(
                        format!("file parameter #{}", factory.index),
                        anyhow!("expected a file path, got {}", other),
                    )),
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(SwanError::conversion(
                    format!("file parameter #{}", factory.index),
                    anyhow!("{} is not a file", other.kind()),
                ));
            }
        };

        for data in files {
            let file_name = file_name.clone().or_else(|| default_file_name(&data));
            body.parts.push(Multipart {
                name: name.clone(),
                file_name,
                data,
            });
        }
    }
    Ok(())
}

fn default_file_name(data: &FileData) -> Option<String> {
    match data {
        FileData::Path(path) => path.file_name().map(|n| n.to_string_lossy().into_owned()),
        FileData::Bytes(_) => None,
    }
}

/// 接口级请求头与全局默认参数/请求头，已存在的同名项优先
fn apply_defaults(
    descriptor: &MethodDescriptor,
    scope: &CallScope<'_>,
    config: &Configuration,
    request: &mut RequestDescriptor,
    body: &mut PendingBody,
) -> Result<()> {
    for template in descriptor.base_headers() {
        let text = template.render(scope)?;
        match split_header(&text) {
            Some((name, value)) => {
                request.headers.insert_if_absent(name, value);
            }
            None => log::warn!("ignoring header template \"{}\" without a name", template.source()),
        }
    }

    let settings = config.settings();
    for (name, value) in &settings.default_headers {
        request.headers.insert_if_absent(name.as_str(), value.as_str());
    }

    for (name, value) in &settings.default_parameters {
        match request.method.default_target() {
            ParamTarget::Body => {
                if !body.pairs.iter().any(|pair| pair.name == *name) {
                    body.pairs.push(NameValue::new(name.as_str(), value.as_str()));
                }
            }
            _ => {
                if !request.query.iter().any(|pair| pair.name == *name) {
                    request.query.push(QueryPair::new(name.as_str(), Some(value.clone())));
                }
            }
        }
    }
    Ok(())
}

/// 渲染数据模板，非空结果以 `&` 连接
fn render_data(descriptor: &MethodDescriptor, scope: &CallScope<'_>) -> Result<Option<String>> {
    let mut rendered = Vec::with_capacity(descriptor.data().len());
    for template in descriptor.data() {
        let text = template.render(scope)?;
        if !text.trim().is_empty() {
            rendered.push(text);
        }
    }
    Ok((!rendered.is_empty()).then(|| rendered.join("&")))
}

/// 只在第一个 `:` 处拆分
fn split_header(text: &str) -> Option<(&str, &str)> {
    let (name, value) = text.split_once(':')?;
    let name = name.trim();
    (!name.is_empty()).then_some((name, value.trim()))
}

/// 确定请求体
///
/// 允许请求体的方法按 multipart、原始数据、对象列表、键值对的顺序选择；
/// 其余方法的键值对与数据模板转入查询串，对象和文件被丢弃。
fn assemble_body(request: &mut RequestDescriptor, mut body: PendingBody, data: Option<String>) -> Option<RequestBody> {
    if !request.method.allows_body() {
        for pair in body.pairs {
            let text = value_to_text(&pair.value).unwrap_or_default();
            request.query.push(QueryPair::new(pair.name, Some(text)));
        }
        if let Some(data) = data {
            request.query.extend(parse_query(&data));
        }
        if !body.objects.is_empty() || !body.parts.is_empty() {
            log::warn!(
                "{}.{}: {} does not carry a body, {} object(s) and {} file(s) dropped",
                request.interface,
                request.method_name,
                request.method,
                body.objects.len(),
                body.parts.len()
            );
        }
        return None;
    }

    let raw_only = body.pairs.is_empty() && body.objects.is_empty() && body.parts.is_empty();
    if let Some(data) = data {
        if raw_only {
            return Some(RequestBody::Raw(data));
        }
        body.pairs.extend(parse_query(&data).into_iter().map(|pair| {
            NameValue::new(pair.name, pair.value.unwrap_or_default())
        }));
    }

    if !body.parts.is_empty() {
        return Some(RequestBody::Multipart {
            fields: body.pairs,
            parts: body.parts,
        });
    }
    if !body.objects.is_empty() {
        let mut objects = body.objects;
        if !body.pairs.is_empty() {
            let folded: Map<String, Value> = body.pairs.into_iter().map(|p| (p.name, p.value)).collect();
            objects.push(Value::Object(folded));
        }
        return Some(RequestBody::Objects(objects));
    }
    if !body.pairs.is_empty() {
        return Some(RequestBody::Form(body.pairs));
    }
    None
}

fn attach_callbacks(descriptor: &MethodDescriptor, args: &[Argument], request: &mut RequestDescriptor) -> Result<()> {
    for (kind, index) in &descriptor.params().callbacks {
        let argument = &args[*index];
        match (kind, argument) {
            (_, argument) if argument.is_null() => {}
            (CallbackKind::OnSuccess, Argument::OnSuccess(callback)) => request.on_success = Some(callback.clone()),
            (CallbackKind::OnError, Argument::OnError(callback)) => request.on_error = Some(callback.clone()),
            (CallbackKind::OnProgress, Argument::OnProgress(callback)) => {
                request.on_progress = Some(callback.clone())
            }
            (kind, other) => {
                return Err(SwanError::conversion(
                    format!("{} argument #{}", kind.as_str(), index),
                    anyhow!("expected a callback, got {}", other.kind()),
                ));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "synthesizer_test.rs"]
mod synthesizer_tests;
