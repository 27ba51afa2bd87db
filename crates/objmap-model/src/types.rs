//! Type references for dynamically-typed object graphs.
//!
//! A [`TypeRef`] names the declared or runtime type of a value. Type
//! references are parsed from compact expressions:
//!
//! | Expression          | Type                                  |
//! |---------------------|---------------------------------------|
//! | `int`, `string`     | scalar                                |
//! | `Address`           | class (or enum once normalized)       |
//! | `list<Address>`     | list with element type                |
//! | `set<string>`       | set with element type                 |
//! | `collection<T>`     | abstract collection                   |
//! | `Address[]`, `int[]`| array with component type             |
//! | `map<string,int>`   | map with key and value types          |
//! | `any` / `object`    | unknown type                          |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Built-in scalar kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    String,
    Date,
}

impl ScalarKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::String => "string",
            Self::Date => "date",
        }
    }

    /// Numeric kinds, integral and floating.
    pub fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Byte | Self::Short | Self::Int | Self::Long | Self::Float | Self::Double
        )
    }

    pub fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Kinds stored inline in primitive arrays (everything except string and date).
    pub fn is_primitive(self) -> bool {
        !matches!(self, Self::String | Self::Date)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s {
            "bool" | "boolean" => Self::Bool,
            "byte" => Self::Byte,
            "short" => Self::Short,
            "int" | "integer" => Self::Int,
            "long" => Self::Long,
            "float" => Self::Float,
            "double" => Self::Double,
            "char" | "character" => Self::Char,
            "string" => Self::String,
            "date" => Self::Date,
            _ => return Err(ModelError::InvalidType(s.to_string())),
        };
        Ok(kind)
    }
}

/// Container shapes used by the collection dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Array,
    List,
    Set,
    Map,
}

/// Declared or runtime type of a value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeRef {
    Any,
    Scalar(ScalarKind),
    Enum(String),
    Class(String),
    List(Box<TypeRef>),
    Set(Box<TypeRef>),
    Array(Box<TypeRef>),
    Collection(Box<TypeRef>),
    Map(Box<TypeRef>, Box<TypeRef>),
}

impl TypeRef {
    pub fn class(name: impl Into<String>) -> Self {
        Self::Class(name.into())
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        Self::Enum(name.into())
    }

    pub fn string() -> Self {
        Self::Scalar(ScalarKind::String)
    }

    pub fn int() -> Self {
        Self::Scalar(ScalarKind::Int)
    }

    pub fn list(element: TypeRef) -> Self {
        Self::List(Box::new(element))
    }

    pub fn set(element: TypeRef) -> Self {
        Self::Set(Box::new(element))
    }

    pub fn array(component: TypeRef) -> Self {
        Self::Array(Box::new(component))
    }

    pub fn map(key: TypeRef, value: TypeRef) -> Self {
        Self::Map(Box::new(key), Box::new(value))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Scalar(_))
    }

    pub fn scalar_kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Scalar(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Enum(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Self::Map(..))
    }

    /// Lists, sets, arrays and abstract collections.
    pub fn is_collection(&self) -> bool {
        matches!(
            self,
            Self::List(_) | Self::Set(_) | Self::Array(_) | Self::Collection(_)
        )
    }

    /// Arrays whose component is a primitive scalar.
    pub fn is_primitive_array(&self) -> bool {
        match self {
            Self::Array(component) => component.scalar_kind().is_some_and(ScalarKind::is_primitive),
            _ => false,
        }
    }

    /// Class or enum name, if this names one.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Class(name) | Self::Enum(name) => Some(name),
            _ => None,
        }
    }

    /// Element type of a collection, or the value type of a map.
    pub fn element_type(&self) -> Option<&TypeRef> {
        match self {
            Self::List(e) | Self::Set(e) | Self::Array(e) | Self::Collection(e) => Some(e),
            Self::Map(_, v) => Some(v),
            _ => None,
        }
    }

    /// Container shape. An abstract `collection` is treated as a list.
    pub fn shape(&self) -> Option<Shape> {
        match self {
            Self::Array(_) => Some(Shape::Array),
            Self::List(_) | Self::Collection(_) => Some(Shape::List),
            Self::Set(_) => Some(Shape::Set),
            Self::Map(..) => Some(Shape::Map),
            _ => None,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Scalar(kind) => f.write_str(kind.as_str()),
            Self::Enum(name) | Self::Class(name) => f.write_str(name),
            Self::List(e) => write!(f, "list<{e}>"),
            Self::Set(e) => write!(f, "set<{e}>"),
            Self::Collection(e) => write!(f, "collection<{e}>"),
            Self::Array(e) => write!(f, "{e}[]"),
            Self::Map(k, v) => write!(f, "map<{k},{v}>"),
        }
    }
}

impl FromStr for TypeRef {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        parse(s).ok_or_else(|| ModelError::InvalidType(s.to_string()))
    }
}

fn parse(expr: &str) -> Option<TypeRef> {
    let expr = expr.trim();
    if expr.is_empty() {
        return None;
    }
    if let Some(component) = expr.strip_suffix("[]") {
        return parse(component).map(TypeRef::array);
    }
    if let Some(open) = expr.find('<') {
        let head = expr[..open].trim();
        let inner = expr.strip_suffix('>')?.get(open + 1..)?;
        let args = split_top_level(inner)?;
        let parsed: Vec<TypeRef> = args.iter().map(|a| parse(a)).collect::<Option<_>>()?;
        return match (head, parsed.as_slice()) {
            ("list", [e]) => Some(TypeRef::list(e.clone())),
            ("set", [e]) => Some(TypeRef::set(e.clone())),
            ("collection", [e]) => Some(TypeRef::Collection(Box::new(e.clone()))),
            ("map", [k, v]) => Some(TypeRef::map(k.clone(), v.clone())),
            _ => None,
        };
    }
    let valid = expr
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '$'));
    if !valid {
        return None;
    }
    let parsed = match expr {
        "any" | "object" => TypeRef::Any,
        "list" => TypeRef::list(TypeRef::Any),
        "set" => TypeRef::set(TypeRef::Any),
        "collection" => TypeRef::Collection(Box::new(TypeRef::Any)),
        "map" => TypeRef::map(TypeRef::Any, TypeRef::Any),
        other => match other.parse::<ScalarKind>() {
            Ok(kind) => TypeRef::Scalar(kind),
            Err(_) => TypeRef::Class(other.to_string()),
        },
    };
    Some(parsed)
}

/// Split a generic argument list on commas that are not nested in `<>`.
pub(crate) fn split_top_level(inner: &str) -> Option<Vec<&str>> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in inner.char_indices() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            ',' if depth == 0 => {
                parts.push(&inner[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    parts.push(&inner[start..]);
    Some(parts)
}
