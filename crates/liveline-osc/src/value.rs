//! Plain argument values and their typed wire counterparts.
//!
//! Callers pass and receive [`Value`]s. The codec works on [`TypedArg`]s,
//! whose tag is inferred on the way out and stripped on the way in.

use serde::{Deserialize, Serialize};

/// An untagged argument value as seen by domain code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Nil,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.is_finite() && f.fract() == 0.0 => Some(*f as i64),
            Value::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Loose truthiness: nil, false, zero, NaN and the empty string are false.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Nil => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::String(s) => !s.is_empty(),
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Nil)
    }
}

/// A tagged OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArg {
    /// `i`
    Int(i32),
    /// `h`
    Int64(i64),
    /// `f`
    Float(f32),
    /// `d`
    Double(f64),
    /// `s`
    String(String),
    /// `T`
    True,
    /// `F`
    False,
    /// `N`
    Nil,
}

impl TypedArg {
    /// Infer a wire tag for a plain value.
    ///
    /// Integral numbers that fit 32 bits go out as `i`, wider integers as `h`,
    /// everything else numeric as `f`.
    ///
    /// `f` is single precision, so a non-integral float is narrowed to `f32`
    /// on the way out: `0.1` comes back as `0.10000000149011612`. Values that
    /// are exact in `f32` (tempos like `128.5`, volumes like `0.25`) survive
    /// unchanged.
    pub fn infer(value: &Value) -> TypedArg {
        match value {
            Value::Nil => TypedArg::Nil,
            Value::Bool(true) => TypedArg::True,
            Value::Bool(false) => TypedArg::False,
            Value::Int(i) => match i32::try_from(*i) {
                Ok(small) => TypedArg::Int(small),
                Err(_) => TypedArg::Int64(*i),
            },
            Value::Float(f) => {
                if f.is_finite()
                    && f.fract() == 0.0
                    && *f >= i32::MIN as f64
                    && *f <= i32::MAX as f64
                {
                    TypedArg::Int(*f as i32)
                } else {
                    TypedArg::Float(*f as f32)
                }
            }
            Value::String(s) => TypedArg::String(s.clone()),
        }
    }

    pub fn tag(&self) -> char {
        match self {
            TypedArg::Int(_) => 'i',
            TypedArg::Int64(_) => 'h',
            TypedArg::Float(_) => 'f',
            TypedArg::Double(_) => 'd',
            TypedArg::String(_) => 's',
            TypedArg::True => 'T',
            TypedArg::False => 'F',
            TypedArg::Nil => 'N',
        }
    }

    /// Strip the tag.
    pub fn into_value(self) -> Value {
        match self {
            TypedArg::Int(i) => Value::Int(i as i64),
            TypedArg::Int64(i) => Value::Int(i),
            TypedArg::Float(f) => Value::Float(f as f64),
            TypedArg::Double(d) => Value::Float(d),
            TypedArg::String(s) => Value::String(s),
            TypedArg::True => Value::Bool(true),
            TypedArg::False => Value::Bool(false),
            TypedArg::Nil => Value::Nil,
        }
    }
}

impl From<&Value> for TypedArg {
    fn from(value: &Value) -> Self {
        TypedArg::infer(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_tags() {
        assert_eq!(TypedArg::infer(&Value::Int(3)).tag(), 'i');
        assert_eq!(TypedArg::infer(&Value::Float(0.5)).tag(), 'f');
        assert_eq!(TypedArg::infer(&Value::Float(2.0)).tag(), 'i');
        assert_eq!(TypedArg::infer(&Value::from("x")).tag(), 's');
        assert_eq!(TypedArg::infer(&Value::Bool(true)).tag(), 'T');
        assert_eq!(TypedArg::infer(&Value::Bool(false)).tag(), 'F');
        assert_eq!(TypedArg::infer(&Value::Nil).tag(), 'N');
    }

    #[test]
    fn test_wide_integer_uses_int64() {
        let big = i64::from(i32::MAX) + 1;
        assert_eq!(TypedArg::infer(&Value::Int(big)), TypedArg::Int64(big));
        assert_eq!(TypedArg::Int64(big).into_value(), Value::Int(big));
    }

    #[test]
    fn test_fractional_float_is_narrowed_to_f32() {
        let arg = TypedArg::infer(&Value::Float(0.1));
        assert_eq!(arg, TypedArg::Float(0.1f32));
        match arg.into_value() {
            Value::Float(back) => {
                assert_ne!(back, 0.1);
                assert_eq!(back, 0.1f32 as f64);
                assert!((back - 0.1).abs() < 1e-7);
            }
            other => panic!("Expected Float, got {:?}", other),
        }

        let exact = TypedArg::infer(&Value::Float(128.5)).into_value();
        assert_eq!(exact, Value::Float(128.5));
    }

    #[test]
    fn test_non_finite_float_stays_float() {
        assert_eq!(TypedArg::infer(&Value::Float(f64::INFINITY)).tag(), 'f');
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Nil.is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("on").is_truthy());
    }

    #[test]
    fn test_value_serializes_untagged() {
        let values = vec![Value::Nil, Value::Int(1), Value::Float(0.5), Value::from("a")];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,1,0.5,"a"]"#);
        let back: Vec<Value> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
