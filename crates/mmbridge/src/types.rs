//! Loosely typed values crossing the automation boundary

use std::fmt;

/// A value as the host hands it over, before any coercion.
///
/// COM properties come back as `VARIANT`s whose runtime type depends on the
/// member and sometimes on the MediaMonkey build, so nothing here is
/// trusted to match the declared type of the member that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum HostValue {
    #[default]
    Empty,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl HostValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, HostValue::Empty)
    }

    /// Stringified form, `None` for an empty value.
    pub fn to_text(&self) -> Option<String> {
        match self {
            HostValue::Empty => None,
            HostValue::Bool(b) => Some(b.to_string()),
            HostValue::Int(i) => Some(i.to_string()),
            HostValue::Float(f) => Some(f.to_string()),
            HostValue::Str(s) => Some(s.clone()),
        }
    }

    /// Integer view. Floats truncate, booleans map to 0/1, strings are parsed.
    pub fn to_i64(&self) -> Option<i64> {
        match self {
            HostValue::Empty => None,
            HostValue::Bool(b) => Some(i64::from(*b)),
            HostValue::Int(i) => Some(*i),
            HostValue::Float(f) if f.is_finite() => Some(f.trunc() as i64),
            HostValue::Float(_) => None,
            HostValue::Str(s) => parse_int(s),
        }
    }

    /// Truthiness the way automation clients usually read flags: non-zero
    /// numbers and non-empty strings are true.
    pub fn truthy(&self) -> bool {
        match self {
            HostValue::Empty => false,
            HostValue::Bool(b) => *b,
            HostValue::Int(i) => *i != 0,
            HostValue::Float(f) => *f != 0.0,
            HostValue::Str(s) => !s.is_empty(),
        }
    }
}

impl fmt::Display for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("<empty>"),
        }
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Bool(value)
    }
}

impl From<i64> for HostValue {
    fn from(value: i64) -> Self {
        HostValue::Int(value)
    }
}

impl From<i32> for HostValue {
    fn from(value: i32) -> Self {
        HostValue::Int(i64::from(value))
    }
}

impl From<&str> for HostValue {
    fn from(value: &str) -> Self {
        HostValue::Str(value.to_string())
    }
}

impl From<String> for HostValue {
    fn from(value: String) -> Self {
        HostValue::Str(value)
    }
}

/// Parse an integer the lenient way: surrounding whitespace is ignored and a
/// leading `+` is accepted.
pub(crate) fn parse_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    trimmed.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_view_accepts_strings_and_numbers() {
        assert_eq!(HostValue::from(" 42 ").to_i64(), Some(42));
        assert_eq!(HostValue::from("+7").to_i64(), Some(7));
        assert_eq!(HostValue::Float(3.9).to_i64(), Some(3));
        assert_eq!(HostValue::Bool(true).to_i64(), Some(1));
        assert_eq!(HostValue::from("seven").to_i64(), None);
        assert_eq!(HostValue::Empty.to_i64(), None);
    }

    #[test]
    fn text_view_of_empty_is_none() {
        assert_eq!(HostValue::Empty.to_text(), None);
        assert_eq!(HostValue::Int(5).to_text().as_deref(), Some("5"));
    }
}
