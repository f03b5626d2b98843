//! Dynamically typed scalar values moved in and out of native memory.

use std::fmt;

use crate::layout::Carrier;

/// A scalar value with the carrier it was produced for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Bool(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    /// A raw native address.
    Address(u64),
}

impl Value {
    pub fn carrier(&self) -> Carrier {
        match self {
            Value::Bool(_) => Carrier::Bool,
            Value::Byte(_) => Carrier::Byte,
            Value::Char(_) => Carrier::Char,
            Value::Short(_) => Carrier::Short,
            Value::Int(_) => Carrier::Int,
            Value::Long(_) => Carrier::Long,
            Value::Float(_) => Carrier::Float,
            Value::Double(_) => Carrier::Double,
            Value::Address(_) => Carrier::Address,
        }
    }

    /// Integer-ish value widened to 64 bits, sign-extending signed carriers.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::Bool(v) => Some(i64::from(v)),
            Value::Byte(v) => Some(i64::from(v)),
            Value::Char(v) => Some(i64::from(v)),
            Value::Short(v) => Some(i64::from(v)),
            Value::Int(v) => Some(i64::from(v)),
            Value::Long(v) => Some(v),
            Value::Address(v) => Some(v as i64),
            Value::Float(_) | Value::Double(_) => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float(v) => Some(f64::from(v)),
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<u64> {
        match *self {
            Value::Address(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Byte(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
            Value::Short(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::Double(v) => write!(f, "{}", v),
            Value::Address(v) => write!(f, "{:#x}", v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i8> for Value {
    fn from(v: i8) -> Self {
        Value::Byte(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Value::Short(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}
