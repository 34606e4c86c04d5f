use std::collections::HashSet;

use crate::config::Configuration;
use crate::descriptor::{ParamDecl, ParamRole, ParamShape};
use crate::error::{Result, SwanError};
use crate::filter::{FilterChain, FilterSpec};
use crate::parsing::Template;
use crate::types::http::ParamTarget;

/// 参数值的展开方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionMode {
    /// 命名参数：一个键值对
    Scalar,
    /// 基础类型或列表：作为一个整体加入对象列表
    List,
    /// 每个条目一个键值对
    Map,
    /// 经 JSON 转换器投影为属性表，每个非空属性一个键值对
    Bean,
    /// 运行时按值判断
    Auto,
    /// 经过 JSON 编码，以 JSON 参数名为键
    Json,
    /// 先经过过滤器链，再按结果展开
    Filtered,
}

/// 参数绑定
#[derive(Debug, Clone)]
pub struct ParameterBinding {
    pub index: usize,
    pub name: Option<String>,
    pub target: ParamTarget,
    pub mode: ExpansionMode,
    pub filters: FilterChain,
}

impl ParameterBinding {
    /// JSON 参数的名称
    pub fn json_name(&self) -> Option<&str> {
        match self.mode {
            ExpansionMode::Json => self.name.as_deref(),
            _ => None,
        }
    }

    /// 过滤器链中是否已经包含 JSON 编码
    pub(crate) fn filters_encode_json(&self) -> bool {
        self.filters.specs().any(|spec| *spec == FilterSpec::Json)
    }
}

/// 命名变量
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub index: usize,
    pub filters: FilterChain,
}

/// 文件上传参数
#[derive(Debug, Clone)]
pub struct MultipartFactory {
    pub index: usize,
    pub name: Template,
    pub file_name: Option<Template>,
}

/// 回调参数种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackKind {
    OnSuccess,
    OnError,
    OnProgress,
}

impl CallbackKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackKind::OnSuccess => "on_success",
            CallbackKind::OnError => "on_error",
            CallbackKind::OnProgress => "on_progress",
        }
    }
}

/// 参数分类结果
#[derive(Debug, Clone, Default)]
pub struct ClassifiedParams {
    pub bindings: Vec<ParameterBinding>,
    pub variables: Vec<Variable>,
    pub multiparts: Vec<MultipartFactory>,
    pub callbacks: Vec<(CallbackKind, usize)>,
    /// 声明的参数个数
    pub arity: usize,
}

impl ClassifiedParams {
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn callback(&self, kind: CallbackKind) -> Option<usize> {
        self.callbacks
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, index)| *index)
    }
}

/// 对方法的参数声明做分类
///
/// # 参数
/// * `method` - 方法名，用于错误信息
/// * `params` - 按位置排列的参数声明
/// * `config` - 全局配置，用于解析过滤器
///
/// # 返回值
/// 分类结果；过滤器未注册、变量名或回调重复时返回配置错误
pub fn classify(method: &str, params: &[ParamDecl], config: &Configuration) -> Result<ClassifiedParams> {
    let mut classified = ClassifiedParams {
        arity: params.len(),
        ..Default::default()
    };
    let mut variable_names = HashSet::new();

    for (index, param) in params.iter().enumerate() {
        let filters = match param.filters.as_deref() {
            Some(names) => config.filters().resolve_chain(names)?,
            None => FilterChain::default(),
        };

        match &param.role {
            ParamRole::Data { name, shape, json } => {
                let name = name.as_ref().filter(|n| !n.trim().is_empty()).cloned();
                // 过滤器和 JSON 标记优先于形态
                let mode = if *json {
                    ExpansionMode::Json
                } else if !filters.is_empty() {
                    ExpansionMode::Filtered
                } else if name.is_some() {
                    ExpansionMode::Scalar
                } else {
                    match shape {
                        ParamShape::Primitive | ParamShape::List => ExpansionMode::List,
                        ParamShape::Map => ExpansionMode::Map,
                        ParamShape::Bean => ExpansionMode::Bean,
                        ParamShape::Auto => ExpansionMode::Auto,
                    }
                };
                if mode == ExpansionMode::Json && name.is_none() {
                    return Err(SwanError::config(format!(
                        "json parameter #{} of \"{}\" needs a name",
                        index, method
                    )));
                }
                classified.bindings.push(ParameterBinding {
                    index,
                    name,
                    target: param.target,
                    mode,
                    filters,
                });
            }
            ParamRole::Variable { name } => {
                if !variable_names.insert(name.clone()) {
                    return Err(SwanError::config(format!(
                        "variable \"{}\" is declared twice on \"{}\"",
                        name, method
                    )));
                }
                classified.variables.push(Variable {
                    name: name.clone(),
                    index,
                    filters,
                });
            }
            ParamRole::Positional => {}
            ParamRole::File { name, file_name } => {
                classified.multiparts.push(MultipartFactory {
                    index,
                    name: Template::parse(name)?,
                    file_name: file_name.as_deref().map(Template::parse).transpose()?,
                });
            }
            ParamRole::OnSuccess => push_callback(&mut classified, method, CallbackKind::OnSuccess, index)?,
            ParamRole::OnError => push_callback(&mut classified, method, CallbackKind::OnError, index)?,
            ParamRole::OnProgress => {
                push_callback(&mut classified, method, CallbackKind::OnProgress, index)?
            }
        }
    }

    Ok(classified)
}

fn push_callback(
    classified: &mut ClassifiedParams,
    method: &str,
    kind: CallbackKind,
    index: usize,
) -> Result<()> {
    if classified.callback(kind).is_some() {
        return Err(SwanError::config(format!(
            "{} callback is declared twice on \"{}\"",
            kind.as_str(),
            method
        )));
    }
    classified.callbacks.push((kind, index));
    Ok(())
}
