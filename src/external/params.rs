//! Parameter descriptors and string parsing for external jobs.
//!
//! The command line carries every value as a string. Each declared parameter
//! has a [`ParamType`] that turns the string back into a [`ParamValue`].
//! Booleans on the command line are strictly `0`/`1`; `job.star` spells
//! them `Yes`/`No`, and the two surfaces are kept apart.

use crate::error::{RelionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Declared type of an external job parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Str,
    Int,
    Float,
    Bool,
    Path,
    /// Comma-separated values of a scalar type
    List(Box<ParamType>),
}

impl ParamType {
    /// Parse a type name: `str`, `int`, `float`, `bool`, `path` or `list[<scalar>]`
    pub fn from_annotation(annotation: &str) -> Result<Self> {
        let name = annotation.trim();
        let ty = match name {
            "str" => ParamType::Str,
            "int" => ParamType::Int,
            "float" => ParamType::Float,
            "bool" => ParamType::Bool,
            "path" | "Path" => ParamType::Path,
            _ => {
                let inner = name
                    .strip_prefix("list[")
                    .and_then(|s| s.strip_suffix(']'))
                    .ok_or_else(|| RelionError::UnsupportedType(name.to_string()))?;
                let inner = ParamType::from_annotation(inner)?;
                ParamType::list_of(inner)
                    .map_err(|_| RelionError::UnsupportedType(name.to_string()))?
            }
        };
        Ok(ty)
    }

    /// A list type; nested lists are rejected
    pub fn list_of(inner: ParamType) -> Result<Self> {
        if matches!(inner, ParamType::List(_)) {
            return Err(RelionError::UnsupportedType(format!("list[{inner}]")));
        }
        Ok(ParamType::List(Box::new(inner)))
    }

    /// Parse a command-line string
    pub fn parse_string(&self, raw: &str) -> Result<ParamValue> {
        let bad = || RelionError::BadValue {
            value: raw.to_string(),
            expected: self.to_string(),
        };
        let value = match self {
            ParamType::Str => ParamValue::Str(raw.to_string()),
            ParamType::Path => ParamValue::Path(PathBuf::from(raw)),
            ParamType::Int => ParamValue::Int(raw.trim().parse().map_err(|_| bad())?),
            ParamType::Float => ParamValue::Float(raw.trim().parse().map_err(|_| bad())?),
            ParamType::Bool => match raw {
                "1" => ParamValue::Bool(true),
                "0" => ParamValue::Bool(false),
                _ => return Err(RelionError::BadBool(raw.to_string())),
            },
            ParamType::List(inner) => {
                if matches!(**inner, ParamType::List(_)) {
                    return Err(RelionError::UnsupportedType(self.to_string()));
                }
                if raw.is_empty() {
                    ParamValue::List(Vec::new())
                } else {
                    ParamValue::List(
                        raw.split(',')
                            .map(|segment| inner.parse_string(segment))
                            .collect::<Result<_>>()?,
                    )
                }
            }
        };
        Ok(value)
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamType::Str => f.write_str("str"),
            ParamType::Int => f.write_str("int"),
            ParamType::Float => f.write_str("float"),
            ParamType::Bool => f.write_str("bool"),
            ParamType::Path => f.write_str("path"),
            ParamType::List(inner) => write!(f, "list[{inner}]"),
        }
    }
}

/// A typed parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    List(Vec<ParamValue>),
}

impl ParamValue {
    /// Command-line spelling: booleans `1`/`0`, lists comma-joined
    pub fn to_cli(&self) -> String {
        match self {
            ParamValue::Bool(b) => String::from(if *b { "1" } else { "0" }),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_cli)
                .collect::<Vec<_>>()
                .join(","),
            other => other.scalar_text(),
        }
    }

    /// `job.star` spelling: booleans `Yes`/`No`
    pub fn to_job_star(&self) -> String {
        match self {
            ParamValue::Bool(b) => String::from(if *b { "Yes" } else { "No" }),
            ParamValue::List(items) => items
                .iter()
                .map(ParamValue::to_job_star)
                .collect::<Vec<_>>()
                .join(","),
            other => other.scalar_text(),
        }
    }

    fn scalar_text(&self) -> String {
        match self {
            ParamValue::Int(v) => v.to_string(),
            ParamValue::Float(v) => v.to_string(),
            ParamValue::Str(s) => s.clone(),
            ParamValue::Path(p) => p.to_string_lossy().into_owned(),
            ParamValue::Bool(_) | ParamValue::List(_) => self.to_cli(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            ParamValue::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}

impl From<PathBuf> for ParamValue {
    fn from(v: PathBuf) -> Self {
        ParamValue::Path(v)
    }
}

/// Values keyed by parameter name
pub type ParamValues = BTreeMap<String, ParamValue>;

/// One declared parameter of an external job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: ParamType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParamValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            help: None,
        }
    }

    /// Declare from a type name, e.g. `ParamSpec::parse("shifts", "list[float]")`
    pub fn parse(name: impl Into<String>, annotation: &str) -> Result<Self> {
        Ok(Self::new(name, ParamType::from_annotation(annotation)?))
    }

    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_from_annotation() {
        assert_eq!(ParamType::from_annotation("int").unwrap(), ParamType::Int);
        assert_eq!(
            ParamType::from_annotation("list[float]").unwrap(),
            ParamType::List(Box::new(ParamType::Float))
        );
        assert!(matches!(
            ParamType::from_annotation("dict").unwrap_err(),
            RelionError::UnsupportedType(_)
        ));
        assert!(matches!(
            ParamType::from_annotation("list[list[int]]").unwrap_err(),
            RelionError::UnsupportedType(_)
        ));
    }

    #[test]
    fn test_bool_accepts_only_zero_and_one() {
        assert_eq!(ParamType::Bool.parse_string("1").unwrap(), ParamValue::Bool(true));
        assert_eq!(ParamType::Bool.parse_string("0").unwrap(), ParamValue::Bool(false));
        for raw in ["Yes", "true", "", "2"] {
            assert!(matches!(
                ParamType::Bool.parse_string(raw).unwrap_err(),
                RelionError::BadBool(_)
            ));
        }
    }

    #[test]
    fn test_bad_values() {
        assert!(matches!(
            ParamType::Int.parse_string("1.5").unwrap_err(),
            RelionError::BadValue { .. }
        ));
        let list = ParamType::List(Box::new(ParamType::Int));
        assert_eq!(
            list.parse_string("1,2,3").unwrap(),
            ParamValue::List(vec![ParamValue::Int(1), ParamValue::Int(2), ParamValue::Int(3)])
        );
        assert!(list.parse_string("1,x").is_err());
        assert_eq!(list.parse_string("").unwrap(), ParamValue::List(vec![]));
    }

    #[test]
    fn test_surface_spellings() {
        assert_eq!(ParamValue::Bool(true).to_cli(), "1");
        assert_eq!(ParamValue::Bool(true).to_job_star(), "Yes");
        assert_eq!(
            ParamValue::List(vec![ParamValue::Float(0.5), ParamValue::Float(2.0)]).to_cli(),
            "0.5,2"
        );
    }

    fn scalar() -> impl Strategy<Value = (ParamType, ParamValue)> {
        prop_oneof![
            any::<bool>().prop_map(|b| (ParamType::Bool, ParamValue::Bool(b))),
            any::<i64>().prop_map(|v| (ParamType::Int, ParamValue::Int(v))),
            any::<f64>()
                .prop_filter("finite", |v| v.is_finite())
                .prop_map(|v| (ParamType::Float, ParamValue::Float(v))),
            "[^,]{1,12}".prop_map(|s| (ParamType::Str, ParamValue::Str(s))),
            "[A-Za-z0-9_/.]{1,16}"
                .prop_map(|s| (ParamType::Path, ParamValue::Path(PathBuf::from(s)))),
        ]
    }

    proptest! {
        #[test]
        fn prop_scalar_round_trip((ty, value) in scalar()) {
            prop_assert_eq!(ty.parse_string(&value.to_cli()).unwrap(), value);
        }

        #[test]
        fn prop_list_round_trip(items in prop::collection::vec(any::<i32>(), 0..8)) {
            let ty = ParamType::List(Box::new(ParamType::Int));
            let value = ParamValue::List(items.into_iter().map(|v| ParamValue::Int(v as i64)).collect());
            prop_assert_eq!(ty.parse_string(&value.to_cli()).unwrap(), value);
        }
    }
}
