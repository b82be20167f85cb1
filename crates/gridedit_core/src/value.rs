use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Scalar cell value.
///
/// Serialized untagged so rows map one-to-one onto JSON objects. Integers and
/// floats stay distinct on the wire but compare numerically, so a loaded `10`
/// and an edited `10.0` are the same cell value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String form used for no-op detection and plain-text display.
    /// Null renders as the empty string.
    pub fn display_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Normalize user input for a numeric column.
    ///
    /// Grouping commas are dropped before parsing. Whole numbers that fit an
    /// `i64` become `Int`; anything that does not parse to a finite number
    /// becomes `Null`.
    pub fn parse_numeric(raw: &str) -> Value {
        let cleaned: String = raw.chars().filter(|c| *c != ',').collect();

        match cleaned.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => match exact_i64(n) {
                Some(i) => Value::Int(i),
                None => Value::Float(n),
            },
            _ => Value::Null,
        }
    }

    fn type_order(&self) -> u8 {
        match self {
            Value::Bool(_) => 0,
            Value::Int(_) | Value::Float(_) => 1,
            Value::Text(_) => 2,
            Value::Null => 3,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_string())
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;

        match (self, other) {
            // Nulls last
            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Greater,
            (_, Null) => Ordering::Less,

            (Bool(a), Bool(b)) => a.cmp(b),
            (Int(a), Int(b)) => a.cmp(b),
            (Float(a), Float(b)) if a == b => Ordering::Equal,
            (Float(a), Float(b)) => a.total_cmp(b),
            (Text(a), Text(b)) => a.cmp(b),

            (Int(a), Float(b)) => cmp_int_float(*a, *b),
            (Float(a), Int(b)) => cmp_int_float(*b, *a).reverse(),

            _ => self.type_order().cmp(&other.type_order()),
        }
    }
}

/// `f` as an `i64` when it is a whole number in range. `-0.0` maps to `0`.
fn exact_i64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is out of range.
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn cmp_int_float(i: i64, f: f64) -> Ordering {
    if f.is_nan() {
        return (i as f64).total_cmp(&f);
    }

    if let Some(whole) = exact_i64(f) {
        return i.cmp(&whole);
    }

    if f >= i64::MAX as f64 {
        Ordering::Less
    } else if f < i64::MIN as f64 {
        Ordering::Greater
    } else {
        // Fractional, so well inside the range where i64 -> f64 keeps order.
        (i as f64).total_cmp(&f)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}
