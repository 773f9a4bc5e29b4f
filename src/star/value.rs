//! Scalar coercions between STAR cells and Rust values.

use std::path::PathBuf;

/// A type that can be bound to a STAR field.
pub trait StarValue: Sized {
    /// Name used in coercion error messages
    fn type_name() -> &'static str;

    /// Parse a raw cell, `None` when the text cannot be coerced
    fn parse_star(raw: &str) -> Option<Self>;

    /// Render as a cell
    fn to_star(&self) -> String;

    /// Render as a cell, `None` when the field should be omitted
    fn to_star_opt(&self) -> Option<String> {
        Some(self.to_star())
    }

    /// Value used when the field is absent and no default is declared
    fn when_missing() -> Option<Self> {
        None
    }

    /// Deterministic sample value for synthesized instances
    fn example(index: usize) -> Self;
}

impl StarValue for String {
    fn type_name() -> &'static str {
        "string"
    }

    fn parse_star(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }

    fn to_star(&self) -> String {
        self.clone()
    }

    fn example(index: usize) -> Self {
        format!("value{index:03}")
    }
}

impl StarValue for PathBuf {
    fn type_name() -> &'static str {
        "path"
    }

    fn parse_star(raw: &str) -> Option<Self> {
        Some(PathBuf::from(raw))
    }

    fn to_star(&self) -> String {
        self.to_string_lossy().into_owned()
    }

    fn example(index: usize) -> Self {
        PathBuf::from(format!("Example/job{:03}/file{index:03}.star", index + 1))
    }
}

macro_rules! impl_numeric {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl StarValue for $ty {
                fn type_name() -> &'static str {
                    $name
                }

                fn parse_star(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }

                fn to_star(&self) -> String {
                    self.to_string()
                }

                fn example(index: usize) -> Self {
                    index as $ty
                }
            }
        )*
    };
}

impl_numeric!(i32 => "integer", i64 => "integer", u32 => "unsigned integer", usize => "unsigned integer");

impl StarValue for f64 {
    fn type_name() -> &'static str {
        "float"
    }

    fn parse_star(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }

    fn to_star(&self) -> String {
        self.to_string()
    }

    fn example(index: usize) -> Self {
        index as f64 * 0.5
    }
}

impl StarValue for bool {
    fn type_name() -> &'static str {
        "boolean"
    }

    /// RELION writes flags as `0`/`1` in metadata and `Yes`/`No` in job options.
    fn parse_star(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(true),
            "0" => Some(false),
            s if s.eq_ignore_ascii_case("yes") || s.eq_ignore_ascii_case("true") => Some(true),
            s if s.eq_ignore_ascii_case("no") || s.eq_ignore_ascii_case("false") => Some(false),
            _ => None,
        }
    }

    fn to_star(&self) -> String {
        let flag = if *self { "1" } else { "0" };
        flag.to_string()
    }

    fn example(index: usize) -> Self {
        index % 2 == 1
    }
}

impl<T: StarValue> StarValue for Option<T> {
    fn type_name() -> &'static str {
        T::type_name()
    }

    /// An empty cell is read as `None`. STAR has no null apart from the
    /// empty value, so `Some("")` and `None` are written alike and both read
    /// back as `None`.
    fn parse_star(raw: &str) -> Option<Self> {
        if raw.is_empty() {
            return Some(None);
        }
        T::parse_star(raw).map(Some)
    }

    fn to_star(&self) -> String {
        self.as_ref().map(T::to_star).unwrap_or_default()
    }

    fn to_star_opt(&self) -> Option<String> {
        self.as_ref().map(T::to_star)
    }

    fn when_missing() -> Option<Self> {
        Some(None)
    }

    fn example(index: usize) -> Self {
        Some(T::example(index))
    }
}
