// Shared value types
//
// Dynamically typed element values flowing through query plans, and the
// statically declared element types used to classify operator calls.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type declared on a query source or a lambda parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementType {
    /// Accepts any element
    Any,
    Boolean,
    Integer,
    Float,
    Text,
    /// Sequence of elements of the inner type
    List(Box<ElementType>),
}

impl ElementType {
    /// Shorthand for `ElementType::List(inner)`
    pub fn list_of(inner: ElementType) -> Self {
        ElementType::List(Box::new(inner))
    }

    /// Whether a value declared as `self` can be bound where `target` is expected.
    pub fn is_assignable_to(&self, target: &ElementType) -> bool {
        match (self, target) {
            (_, ElementType::Any) | (ElementType::Any, _) => true,
            (ElementType::List(a), ElementType::List(b)) => a.is_assignable_to(b),
            (a, b) => a == b,
        }
    }

    /// Whether a runtime value conforms to this declared type.
    /// Null conforms to every type.
    pub fn admits(&self, value: &Value) -> bool {
        match (self, value) {
            (ElementType::Any, _) | (_, Value::Null) => true,
            (ElementType::Boolean, Value::Boolean(_)) => true,
            (ElementType::Integer, Value::Integer(_)) => true,
            (ElementType::Float, Value::Float(_)) => true,
            (ElementType::Text, Value::Text(_)) => true,
            (ElementType::List(inner), Value::List(items)) => items.iter().all(|v| inner.admits(v)),
            _ => false,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Any => write!(f, "any"),
            ElementType::Boolean => write!(f, "bool"),
            ElementType::Integer => write!(f, "int"),
            ElementType::Float => write!(f, "float"),
            ElementType::Text => write!(f, "text"),
            ElementType::List(inner) => write!(f, "[{}]", inner),
        }
    }
}

/// A single element produced or consumed by a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    List(Vec<Value>),
}

impl Value {
    /// Most specific declared type describing this value
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Null => ElementType::Any,
            Value::Boolean(_) => ElementType::Boolean,
            Value::Integer(_) => ElementType::Integer,
            Value::Float(_) => ElementType::Float,
            Value::Text(_) => ElementType::Text,
            Value::List(items) => match items.first() {
                Some(first) => ElementType::list_of(first.element_type()),
                None => ElementType::list_of(ElementType::Any),
            },
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Consume the value as a sequence. Null is an empty sequence; any other
    /// scalar is handed back unchanged.
    pub fn into_list(self) -> Result<Vec<Value>, Value> {
        match self {
            Value::List(items) => Ok(items),
            Value::Null => Ok(Vec::new()),
            other => Err(other),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Null, _) => Some(Ordering::Less),
            (_, Value::Null) => Some(Ordering::Greater),
            (Value::Boolean(a), Value::Boolean(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Integer(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Integer(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Integer(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:?}", fl),
            Value::Text(s) => write!(f, "\"{}\"", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::List(items.into_iter().map(Into::into).collect())
    }
}
