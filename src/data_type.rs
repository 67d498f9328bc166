use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Largest scale a [Decimal] can carry.
pub const MAX_DECIMAL_SCALE: u32 = 28;

/// Represents the supported data types in the database schema.
/// These types define the structure of columns and the expected format of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum DataType {
    /// A 64-bit signed integer.
    Int,
    /// A string of at most `max_len` characters. Longer input is truncated.
    Varchar { max_len: usize },
    /// A fixed-point number rounded to `scale` fractional digits.
    Decimal { precision: u32, scale: u32 },
    /// A 64-bit floating-point number.
    Float,
    /// A boolean value (true or false).
    Boolean,
    /// An unbounded UTF-8 character string.
    Text,
    /// A calendar date, stored verbatim as text.
    Date,
    /// A date and time, stored verbatim as text.
    DateTime,
}

impl DataType {
    /// Coerces a non-null value to this type.
    ///
    /// Returns `None` when the value has no lossless representation in the
    /// type. `NULL` is passed through untouched; nullability is a column
    /// constraint, not a type rule.
    ///
    /// VARCHAR silently truncates to `max_len` characters instead of failing.
    pub fn coerce(&self, value: &Value) -> Option<Value> {
        if value.is_null() {
            return Some(Value::Null);
        }
        match self {
            Self::Int => to_int(value).map(Value::Int),
            Self::Varchar { max_len } => {
                let text = textual(value);
                if text.chars().count() > *max_len {
                    let truncated: String = text.chars().take(*max_len).collect();
                    Some(Value::Text(Arc::from(truncated)))
                } else {
                    Some(Value::Text(text))
                }
            }
            Self::Decimal { scale, .. } => {
                let mut d = to_decimal(value)?
                    .round_dp_with_strategy(*scale, RoundingStrategy::MidpointNearestEven);
                d.rescale(*scale);
                // rescale lowers the scale instead of overflowing the mantissa
                (d.scale() == *scale).then_some(Value::Decimal(d))
            }
            Self::Float => to_float(value).map(Value::Float),
            Self::Boolean => to_bool(value).map(Value::Bool),
            Self::Text | Self::Date | Self::DateTime => Some(Value::Text(textual(value))),
        }
    }

    /// Normalises a comparison literal to this type.
    ///
    /// Same as [DataType::coerce] except that VARCHAR literals are not
    /// truncated, so `name = 'Alice'` never matches a stored `'Ali'`.
    pub fn normalize_literal(&self, value: &Value) -> Option<Value> {
        match self {
            Self::Varchar { .. } if !value.is_null() => Some(Value::Text(textual(value))),
            _ => self.coerce(value),
        }
    }

    /// Resolves a SQL type name and its parenthesised parameters.
    ///
    /// Returns `Err` with a human readable reason for unknown names or
    /// invalid parameters.
    pub fn from_sql(name: &str, params: &[u64]) -> Result<Self, String> {
        let upper = name.to_uppercase();
        let no_params = |data_type: Self| {
            if params.is_empty() {
                Ok(data_type)
            } else {
                Err(format!("type {upper} takes no parameters"))
            }
        };
        match upper.as_str() {
            "INT" | "INTEGER" => no_params(Self::Int),
            "FLOAT" | "REAL" | "DOUBLE" => no_params(Self::Float),
            "BOOLEAN" | "BOOL" => no_params(Self::Boolean),
            "TEXT" => no_params(Self::Text),
            "DATE" => no_params(Self::Date),
            "DATETIME" | "TIMESTAMP" => no_params(Self::DateTime),
            "VARCHAR" => match params {
                [len] => Ok(Self::Varchar {
                    max_len: usize::try_from(*len)
                        .map_err(|_| format!("VARCHAR length {len} is too large"))?,
                }),
                [] => Err("VARCHAR requires a length, e.g. VARCHAR(50)".into()),
                _ => Err("VARCHAR takes exactly one parameter".into()),
            },
            "DECIMAL" | "NUMERIC" => {
                let (precision, scale) = match params {
                    [] => (10, 0),
                    [p] => (*p, 0),
                    [p, s] => (*p, *s),
                    _ => return Err("DECIMAL takes at most two parameters".into()),
                };
                let precision =
                    u32::try_from(precision).map_err(|_| "DECIMAL precision is too large")?;
                let scale = u32::try_from(scale).map_err(|_| "DECIMAL scale is too large")?;
                if precision == 0 || scale > precision || scale > MAX_DECIMAL_SCALE {
                    return Err(format!("invalid DECIMAL({precision},{scale})"));
                }
                Ok(Self::Decimal { precision, scale })
            }
            _ => Err(format!("unknown data type '{name}'")),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "INT"),
            Self::Varchar { max_len } => write!(f, "VARCHAR({max_len})"),
            Self::Decimal { precision, scale } => write!(f, "DECIMAL({precision},{scale})"),
            Self::Float => write!(f, "FLOAT"),
            Self::Boolean => write!(f, "BOOLEAN"),
            Self::Text => write!(f, "TEXT"),
            Self::Date => write!(f, "DATE"),
            Self::DateTime => write!(f, "DATETIME"),
        }
    }
}

fn textual(value: &Value) -> Arc<str> {
    match value {
        Value::Text(s) => Arc::clone(s),
        other => Arc::from(other.to_string()),
    }
}

fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
        Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => {
            Some(*f as i64)
        }
        Value::Decimal(d) if d.fract().is_zero() => d.to_i64(),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>().ok().or_else(|| {
                Decimal::from_str(s)
                    .ok()
                    .filter(|d| d.fract().is_zero())
                    .and_then(|d| d.to_i64())
            })
        }
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Float(f) if f.is_finite() => Decimal::from_str(&f.to_string()).ok(),
        Value::Decimal(d) => Some(*d),
        Value::Text(s) => {
            let s = s.trim();
            Decimal::from_str(s)
                .or_else(|_| Decimal::from_scientific(s))
                .ok()
        }
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<f64> {
    let f = match value {
        Value::Int(i) => *i as f64,
        Value::Float(f) => *f,
        Value::Decimal(d) => d.to_f64()?,
        Value::Text(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // NaN and infinities have no JSON form
    f.is_finite().then_some(f)
}

fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Int(i) => Some(*i != 0),
        Value::Float(f) => Some(*f != 0.0),
        Value::Decimal(d) => Some(!d.is_zero()),
        Value::Text(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "t" => Some(true),
            "false" | "0" | "no" | "f" => Some(false),
            _ => None,
        },
        Value::Null => None,
    }
}
