pub mod template;
pub mod url;

pub use template::{Node, Template, VariableScope};
pub use self::url::{ParsedUrl, join_url, parse_query, parse_url, split_pairs};
