// ABOUTME: Maps database-native column types onto portable schema type tags
// ABOUTME: Unrecognized types fall back to text so a dump never fails on exotic columns

use super::Value;
use std::fmt;

/// Storage size hint for integer, float, text and blob columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Size {
    Tiny,
    Small,
    Medium,
    Normal,
    Big,
}

impl Size {
    pub fn as_str(&self) -> &'static str {
        match self {
            Size::Tiny => "tiny",
            Size::Small => "small",
            Size::Medium => "medium",
            Size::Normal => "normal",
            Size::Big => "big",
        }
    }
}

/// Engine-agnostic classification of a column's storage type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortableType {
    Int { size: Size, unsigned: bool },
    Float { size: Size },
    Numeric { precision: Option<u32>, scale: Option<u32> },
    Char { length: Option<u32> },
    Varchar { length: Option<u32> },
    Text { size: Size },
    Blob { size: Size },
    Boolean,
    Date,
    Time,
    DateTime,
    /// No portable counterpart; exported as unbounded text with a caveat
    FallbackText,
}

impl PortableType {
    /// Type name used in the emitted schema definition
    pub fn schema_name(&self) -> &'static str {
        match self {
            PortableType::Int { .. } => "int",
            PortableType::Float { .. } => "float",
            PortableType::Numeric { .. } => "numeric",
            PortableType::Char { .. } => "char",
            PortableType::Varchar { .. } => "varchar",
            PortableType::Text { .. } | PortableType::FallbackText => "text",
            PortableType::Blob { .. } => "blob",
            PortableType::Boolean => "bool",
            PortableType::Date => "date",
            PortableType::Time => "time",
            PortableType::DateTime => "datetime",
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            PortableType::Int { .. } | PortableType::Float { .. } | PortableType::Numeric { .. }
        )
    }
}

/// A native column type with its declared parameters
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NativeType {
    /// Lowercased base name, e.g. `varchar` or `timestamp without time zone`
    pub name: String,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub scale: Option<u32>,
    pub unsigned: bool,
}

impl NativeType {
    pub fn new(name: &str) -> Self {
        Self {
            name: collapse_whitespace(&name.to_lowercase()),
            ..Self::default()
        }
    }

    /// Parse a declared type string such as `int(10) unsigned` or `decimal(10,2)`
    pub fn parse(declared: &str) -> Self {
        let lower = declared.trim().to_lowercase();
        let (outside, params) = match (lower.find('('), lower.rfind(')')) {
            (Some(open), Some(close)) if close > open => (
                format!("{} {}", &lower[..open], &lower[close + 1..]),
                lower[open + 1..close].to_string(),
            ),
            _ => (lower.clone(), String::new()),
        };

        let mut unsigned = false;
        let words: Vec<&str> = outside
            .split_whitespace()
            .filter(|word| match *word {
                "unsigned" => {
                    unsigned = true;
                    false
                }
                "signed" | "zerofill" => false,
                _ => true,
            })
            .collect();

        let numbers: Vec<u32> = params
            .split(',')
            .filter_map(|p| p.trim().parse().ok())
            .collect();

        let mut native = NativeType {
            name: words.join(" "),
            unsigned,
            ..Self::default()
        };
        match numbers.as_slice() {
            [length] => native.length = Some(*length),
            [precision, scale] => {
                native.precision = Some(*precision);
                native.scale = Some(*scale);
            }
            _ => {}
        }
        native
    }

    pub fn with_length(mut self, length: Option<u32>) -> Self {
        self.length = length;
        self
    }

    pub fn with_precision(mut self, precision: Option<u32>, scale: Option<u32>) -> Self {
        self.precision = precision;
        self.scale = scale;
        self
    }
}

impl fmt::Display for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        match (self.precision, self.scale, self.length) {
            (Some(p), Some(s), _) => write!(f, "({},{})", p, s)?,
            (Some(p), None, _) => write!(f, "({})", p)?,
            (None, _, Some(l)) => write!(f, "({})", l)?,
            _ => {}
        }
        if self.unsigned {
            write!(f, " unsigned")?;
        }
        Ok(())
    }
}

/// Resolve a native type to exactly one portable tag
pub fn map_native_type(native: &NativeType) -> PortableType {
    let unsigned = native.unsigned;
    let int = |size| PortableType::Int { size, unsigned };

    match native.name.as_str() {
        "tinyint" | "int1" => int(Size::Tiny),
        "smallint" | "int2" | "smallserial" => int(Size::Small),
        "mediumint" | "int3" => int(Size::Medium),
        "int" | "integer" | "int4" | "serial" => int(Size::Normal),
        "bigint" | "big int" | "int8" | "bigserial" => int(Size::Big),

        "bool" | "boolean" => PortableType::Boolean,
        "bit" if native.length.unwrap_or(1) == 1 => PortableType::Boolean,

        "float" | "float4" => PortableType::Float { size: Size::Normal },
        "double" | "double precision" | "float8" | "real" => PortableType::Float { size: Size::Big },

        "decimal" | "numeric" | "dec" | "fixed" => PortableType::Numeric {
            precision: native.precision.or(native.length),
            scale: native.scale,
        },

        "char" | "character" | "nchar" | "bpchar" | "native character" => PortableType::Char {
            length: native.length,
        },
        "varchar" | "character varying" | "varying character" | "nvarchar" | "varchar2" => {
            PortableType::Varchar {
                length: native.length,
            }
        }

        "tinytext" => PortableType::Text { size: Size::Tiny },
        "mediumtext" => PortableType::Text { size: Size::Medium },
        "longtext" => PortableType::Text { size: Size::Big },
        "text" | "clob" | "citext" => PortableType::Text { size: Size::Normal },

        "blob" | "tinyblob" | "binary" | "varbinary" | "bytea" => {
            PortableType::Blob { size: Size::Normal }
        }
        "mediumblob" | "longblob" => PortableType::Blob { size: Size::Big },

        "date" => PortableType::Date,
        "time" | "time without time zone" => PortableType::Time,
        "datetime" | "timestamp" | "timestamp without time zone" => PortableType::DateTime,

        other => {
            tracing::debug!("No portable mapping for native type '{}'", other);
            PortableType::FallbackText
        }
    }
}

/// Reduce a native default expression to a literal value
///
/// Quoted literals are unquoted, PostgreSQL casts (`'x'::text`) are stripped
/// and numbers are parsed for numeric columns. Expressions such as
/// `CURRENT_TIMESTAMP` or `nextval(...)` have no literal form and yield `None`.
pub fn normalize_default(raw: Option<&str>, portable: &PortableType) -> Option<Value> {
    let mut text = raw?.trim();
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        return None;
    }

    while text.len() >= 2 && text.starts_with('(') && text.ends_with(')') {
        text = text[1..text.len() - 1].trim();
    }

    if let Some(stripped) = strip_pg_cast(text) {
        text = stripped;
        if text.eq_ignore_ascii_case("null") {
            return None;
        }
    }

    // Hex literals such as X'00' have no portable default form
    if matches!(portable, PortableType::Blob { .. }) && is_hex_literal(text) {
        return None;
    }

    if let Some(quoted) = text
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
    {
        let literal = quoted.replace("''", "'");
        return Some(literal_for(literal, portable));
    }

    if text.contains('(') || text.to_uppercase().starts_with("CURRENT_") {
        return None;
    }

    if portable.is_numeric() || *portable == PortableType::Boolean {
        return parse_scalar(text, portable);
    }

    Some(Value::Text(text.to_string()))
}

fn literal_for(literal: String, portable: &PortableType) -> Value {
    if portable.is_numeric() || *portable == PortableType::Boolean {
        if let Some(value) = parse_scalar(&literal, portable) {
            return value;
        }
    }
    Value::Text(literal)
}

fn parse_scalar(text: &str, portable: &PortableType) -> Option<Value> {
    match portable {
        PortableType::Boolean => match text.to_lowercase().as_str() {
            "1" | "true" | "t" | "b'1'" => Some(Value::Bool(true)),
            "0" | "false" | "f" | "b'0'" => Some(Value::Bool(false)),
            _ => None,
        },
        PortableType::Int { .. } => text
            .parse::<i64>()
            .map(Value::Int)
            .or_else(|_| text.parse::<u64>().map(Value::UInt))
            .ok(),
        PortableType::Float { .. } => text.parse::<f64>().map(Value::Float).ok(),
        // Keep decimals textual so precision survives the round trip
        PortableType::Numeric { .. } => text
            .parse::<f64>()
            .ok()
            .map(|_| Value::Text(text.to_string())),
        _ => None,
    }
}

/// Drop a trailing `::type` cast that sits outside any quoted literal
///
/// Handles `'x'::text`, `0::numeric`, `(-1)::integer` and `NULL::varchar`.
/// Other unquoted text is left alone, so a default such as `a::b` survives.
fn strip_pg_cast(text: &str) -> Option<&str> {
    if text.starts_with('\'') {
        let end = closing_quote(text)?;
        return text[end + 1..]
            .trim_start()
            .starts_with("::")
            .then(|| &text[..=end]);
    }

    let (head, _) = text.split_once("::")?;
    let head = head.trim();
    let bare = head.trim_start_matches('(').trim_end_matches(')').trim();
    let is_literal = bare.eq_ignore_ascii_case("null")
        || bare.eq_ignore_ascii_case("true")
        || bare.eq_ignore_ascii_case("false")
        || bare.parse::<f64>().is_ok();
    is_literal.then_some(bare)
}

/// Byte offset of the quote closing a literal that opens at offset 0
fn closing_quote(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut idx = 1;
    while idx < bytes.len() {
        if bytes[idx] == b'\'' {
            if bytes.get(idx + 1) == Some(&b'\'') {
                idx += 2;
                continue;
            }
            return Some(idx);
        }
        idx += 1;
    }
    None
}

fn is_hex_literal(text: &str) -> bool {
    let Some(rest) = text
        .strip_prefix("X'")
        .or_else(|| text.strip_prefix("x'"))
    else {
        return false;
    };
    rest.strip_suffix('\'')
        .is_some_and(|hex| hex.chars().all(|c| c.is_ascii_hexdigit()))
}

fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}
