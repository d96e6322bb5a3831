// ABOUTME: PHP literal and array rendering for generated dump files
// ABOUTME: Produces short-array syntax with two-space indentation and escaped single-quoted strings

use crate::schema::Value;
use base64::{engine::general_purpose::STANDARD, Engine as _};

/// A PHP expression in a generated file
#[derive(Debug, Clone, PartialEq)]
pub enum PhpNode {
    /// Already-rendered scalar expression
    Literal(String),
    Array(Vec<PhpItem>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PhpItem {
    Keyed(String, PhpNode),
    Positional(PhpNode),
    /// A `//` line inside the array
    Comment(String),
}

impl PhpNode {
    pub fn string(text: &str) -> Self {
        PhpNode::Literal(string_literal(text))
    }

    pub fn bool(flag: bool) -> Self {
        PhpNode::Literal(if flag { "TRUE" } else { "FALSE" }.to_string())
    }

    pub fn value(value: &Value) -> Self {
        PhpNode::Literal(value_literal(value))
    }

    /// A positional array of string literals
    pub fn string_list<'a>(items: impl IntoIterator<Item = &'a str>) -> Self {
        PhpNode::Array(
            items
                .into_iter()
                .map(|item| PhpItem::Positional(PhpNode::string(item)))
                .collect(),
        )
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, depth: usize) {
        match self {
            PhpNode::Literal(text) => out.push_str(text),
            PhpNode::Array(items) if items.is_empty() => out.push_str("[]"),
            PhpNode::Array(items) => {
                let pad = "  ".repeat(depth + 1);
                out.push_str("[\n");
                for item in items {
                    out.push_str(&pad);
                    match item {
                        PhpItem::Keyed(key, node) => {
                            out.push_str(&string_literal(key));
                            out.push_str(" => ");
                            node.write(out, depth + 1);
                            out.push_str(",\n");
                        }
                        PhpItem::Positional(node) => {
                            node.write(out, depth + 1);
                            out.push_str(",\n");
                        }
                        PhpItem::Comment(text) => {
                            out.push_str("// ");
                            out.push_str(&text.replace(['\r', '\n'], " "));
                            out.push('\n');
                        }
                    }
                }
                out.push_str(&"  ".repeat(depth));
                out.push(']');
            }
        }
    }
}

/// Single-quoted PHP string with `\` and `'` escaped
///
/// # Examples
///
/// ```
/// # use seren_db_dump::emitter::php::string_literal;
/// assert_eq!(string_literal("it's"), r"'it\'s'");
/// assert_eq!(string_literal(r"C:\tmp"), r"'C:\\tmp'");
/// ```
pub fn string_literal(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// PHP expression for a cell value
pub fn value_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(i) => i.to_string(),
        Value::UInt(u) => u.to_string(),
        Value::Float(f) => float_literal(*f),
        Value::Text(text) => string_literal(text),
        Value::Bytes(bytes) => format!("base64_decode('{}')", STANDARD.encode(bytes)),
    }
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        return "NAN".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "INF" } else { "-INF" }.to_string();
    }
    // Debug formatting keeps a fractional part (1.0) so PHP reads back a float
    format!("{:?}", f)
}
