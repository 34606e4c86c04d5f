use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, SwanError};

/// 模板节点
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Literal(String),
    /// `{name}` 变量引用，`name` 也可以是参数下标，如 `{0}`
    Ref(String),
}

/// 已解析的字符串模板
///
/// 模板在注册期解析一次，之后每次调用只做渲染。`{{` 和 `}}`
/// 分别表示字面量 `{` 和 `}`。
#[derive(Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    nodes: Vec<Node>,
}

/// 模板渲染时的变量来源
pub trait VariableScope {
    /// 查找变量的字符串值，未绑定时返回 `Ok(None)`
    fn resolve(&self, name: &str) -> Result<Option<String>>;
}

impl VariableScope for HashMap<String, String> {
    fn resolve(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

impl VariableScope for () {
    fn resolve(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

impl Template {
    /// 解析模板
    ///
    /// # 参数
    /// * `text` - 模板文本
    ///
    /// # 返回值
    /// 解析后的模板；括号不匹配、引用为空或名称非法时返回 `SwanError::Template`
    pub fn parse(text: &str) -> Result<Self> {
        let mut nodes = Vec::new();
        let mut literal = String::new();
        let mut chars = text.char_indices().peekable();

        while let Some((offset, ch)) = chars.next() {
            match ch {
                '{' => {
                    if matches!(chars.peek(), Some((_, '{'))) {
                        chars.next();
                        literal.push('{');
                        continue;
                    }
                    let mut name = String::new();
                    let mut closed = false;
                    for (inner_offset, inner) in chars.by_ref() {
                        match inner {
                            '}' => {
                                closed = true;
                                break;
                            }
                            '{' => return Err(template_error(text, inner_offset, "nested '{'")),
                            c => name.push(c),
                        }
                    }
                    if !closed {
                        return Err(template_error(text, offset, "unclosed '{'"));
                    }
                    let name = name.trim();
                    if name.is_empty() {
                        return Err(template_error(text, offset, "empty reference"));
                    }
                    if !name.chars().all(is_name_char) {
                        return Err(template_error(
                            text,
                            offset,
                            &format!("invalid reference name \"{}\"", name),
                        ));
                    }
                    if !literal.is_empty() {
                        nodes.push(Node::Literal(std::mem::take(&mut literal)));
                    }
                    nodes.push(Node::Ref(name.to_string()));
                }
                '}' => {
                    if matches!(chars.peek(), Some((_, '}'))) {
                        chars.next();
                        literal.push('}');
                    } else {
                        return Err(template_error(text, offset, "unmatched '}'"));
                    }
                }
                c => literal.push(c),
            }
        }
        if !literal.is_empty() {
            nodes.push(Node::Literal(literal));
        }

        Ok(Template {
            source: text.to_string(),
            nodes,
        })
    }

    /// 渲染模板，未绑定的变量渲染为空字符串
    pub fn render(&self, scope: &dyn VariableScope) -> Result<String> {
        let mut output = String::with_capacity(self.source.len());
        for node in &self.nodes {
            match node {
                Node::Literal(text) => output.push_str(text),
                Node::Ref(name) => {
                    if let Some(value) = scope.resolve(name)? {
                        output.push_str(&value);
                    }
                }
            }
        }
        Ok(output)
    }

    /// 模板中引用的全部变量名（按出现顺序，可能重复）
    pub fn references(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().filter_map(|node| match node {
            Node::Ref(name) => Some(name.as_str()),
            Node::Literal(_) => None,
        })
    }

    /// 不含变量引用
    pub fn is_constant(&self) -> bool {
        self.references().next().is_none()
    }

    /// 源文本为空或只含空白
    pub fn is_blank(&self) -> bool {
        self.source.trim().is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template({:?})", self.source)
    }
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '.' | '-')
}

fn template_error(template: &str, offset: usize, message: &str) -> SwanError {
    SwanError::Template {
        template: template.to_string(),
        offset,
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_reference_free_template_renders_itself() {
        for text in ["", "plain", "http://a.com/x?y=1&z=2", "a:b", "{{literal}}"] {
            let template = Template::parse(text).unwrap();
            let expected = text.replace("{{", "{").replace("}}", "}");
            assert_eq!(template.render(&vars(&[("id", "1")])).unwrap(), expected);
            assert_eq!(template.render(&()).unwrap(), expected);
            assert!(template.is_constant());
        }
    }

    #[test]
    fn test_render_single_reference() {
        let template = Template::parse("{id}").unwrap();
        assert_eq!(template.render(&vars(&[("id", "5")])).unwrap(), "5");
        assert_eq!(template.references().collect::<Vec<_>>(), vec!["id"]);
    }

    #[test]
    fn test_render_mixed_nodes() {
        let template = Template::parse("http://{domain}/users?id={ id }").unwrap();
        assert_eq!(
            template.nodes(),
            &[
                Node::Literal("http://".to_string()),
                Node::Ref("domain".to_string()),
                Node::Literal("/users?id=".to_string()),
                Node::Ref("id".to_string()),
            ]
        );
        let rendered = template
            .render(&vars(&[("domain", "a.com"), ("id", "5")]))
            .unwrap();
        assert_eq!(rendered, "http://a.com/users?id=5");
    }

    #[test]
    fn test_missing_binding_renders_empty() {
        let template = Template::parse("a{missing}b").unwrap();
        assert_eq!(template.render(&()).unwrap(), "ab");
    }

    #[test]
    fn test_escaped_braces() {
        let template = Template::parse(r#"{{"name": "{name}"}}"#).unwrap();
        assert_eq!(
            template.render(&vars(&[("name", "swan")])).unwrap(),
            r#"{"name": "swan"}"#
        );
    }

    #[test]
    fn test_positional_and_dotted_names() {
        let template = Template::parse("{0}-{user.name}-{x_y-z}").unwrap();
        assert_eq!(
            template.references().collect::<Vec<_>>(),
            vec!["0", "user.name", "x_y-z"]
        );
    }

    #[test]
    fn test_malformed_references() {
        let cases = [
            ("abc{id", 3, "unclosed"),
            ("abc}", 3, "unmatched"),
            ("{a{b}}", 2, "nested"),
            ("x{}", 1, "empty"),
            ("{a b}", 0, "invalid reference name"),
        ];
        for (text, expected_offset, expected_message) in cases {
            match Template::parse(text) {
                Err(SwanError::Template {
                    template,
                    offset,
                    message,
                }) => {
                    assert_eq!(template, text);
                    assert_eq!(offset, expected_offset, "offset for {}", text);
                    assert!(message.contains(expected_message), "{}: {}", text, message);
                }
                other => panic!("expected template error for {}, got {:?}", text, other),
            }
        }
    }

    #[test]
    fn test_scope_errors_propagate() {
        struct Failing;
        impl VariableScope for Failing {
            fn resolve(&self, name: &str) -> Result<Option<String>> {
                Err(SwanError::conversion(
                    format!("variable \"{}\"", name),
                    anyhow::anyhow!("filter failed"),
                ))
            }
        }
        let template = Template::parse("{v}").unwrap();
        assert!(matches!(
            template.render(&Failing),
            Err(SwanError::Conversion { .. })
        ));
    }

    #[test]
    fn test_blank() {
        assert!(Template::parse("  ").unwrap().is_blank());
        assert!(!Template::parse("{a}").unwrap().is_blank());
    }
}
