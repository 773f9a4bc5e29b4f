//! Typed bindings from STAR blocks to Rust records.
//!
//! Models are declared with [`star_record!`](crate::star_record) (one
//! single-record block) and [`star_loop!`](crate::star_loop) (one row of a
//! loop block). Each field binds an attribute to a STAR name, a coercion
//! (its Rust type, via [`StarValue`]) and an optional default:
//!
//! ```ignore
//! himena_relion::star_record! {
//!     #[derive(Debug, Clone, PartialEq)]
//!     pub struct General in "pipeline_general" {
//!         pub job_counter: u32 => "rlnPipeLineJobCounter" = 1,
//!     }
//! }
//! ```
//!
//! Multi-block files implement [`StarModel`] by composing these pieces.

use super::document::{LoopTable, SingleRecord, StarBlock, StarDocument};
use super::value::StarValue;
use crate::error::{RelionError, Result, ResultExt};
use std::path::Path;

/// A record bound to a single-record block
pub trait StarRecord: Sized {
    /// Block name without the `data_` prefix
    const BLOCK: &'static str;

    /// Bound STAR field names in declaration order
    fn field_names() -> &'static [&'static str];

    fn from_record(record: &SingleRecord) -> Result<Self>;

    fn to_record(&self) -> SingleRecord;

    fn example(index: usize) -> Self;

    /// Locate and bind the block inside a document
    fn from_document(doc: &StarDocument) -> Result<Self> {
        match doc.block(Self::BLOCK) {
            Some(StarBlock::Single(record)) => Self::from_record(record),
            Some(StarBlock::Loop(_)) => Err(RelionError::schema(
                Self::BLOCK,
                "expected a single record, found a loop",
            )),
            None => Err(RelionError::schema(Self::BLOCK, "required block is missing")),
        }
    }

    fn to_block(&self) -> StarBlock {
        StarBlock::Single(self.to_record())
    }
}

/// One row of a loop block
pub trait LoopRow: Sized {
    /// Block name without the `data_` prefix
    const BLOCK: &'static str;

    /// Bound STAR column names in declaration order
    fn columns() -> &'static [&'static str];

    /// Rust attribute names, parallel to [`LoopRow::columns`]
    fn attributes() -> &'static [&'static str];

    fn from_row(table: &LoopTable, row: usize) -> Result<Self>;

    /// Cells parallel to [`LoopRow::columns`]; `None` for absent optionals
    fn to_cells(&self) -> Vec<Option<String>>;

    fn example(index: usize) -> Self;
}

/// Bind one raw cell, applying the default or the type's missing value.
pub fn bind_field<T, F>(location: F, raw: Option<&str>, default: Option<T>) -> Result<T>
where
    T: StarValue,
    F: FnOnce() -> String,
{
    match raw {
        Some(raw) => T::parse_star(raw).ok_or_else(|| {
            RelionError::schema(
                location(),
                format!("cannot coerce {raw:?} to {}", T::type_name()),
            )
        }),
        None => default
            .or_else(T::when_missing)
            .ok_or_else(|| RelionError::schema(location(), "required field is missing")),
    }
}

/// Rows of a loop model plus any columns the model does not declare.
#[derive(Debug, Clone, PartialEq)]
pub struct Loop<R> {
    rows: Vec<R>,
    extra_columns: Vec<String>,
    /// One entry per row, parallel to `extra_columns`
    extra_cells: Vec<Vec<String>>,
}

impl<R> Default for Loop<R> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            extra_columns: Vec::new(),
            extra_cells: Vec::new(),
        }
    }
}

impl<R: LoopRow> Loop<R> {
    pub fn new(rows: Vec<R>) -> Self {
        let extra_cells = vec![Vec::new(); rows.len()];
        Self {
            rows,
            extra_columns: Vec::new(),
            extra_cells,
        }
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn iter(&self) -> std::slice::Iter<'_, R> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<R> {
        self.rows
    }

    /// Append a row; undeclared columns get empty cells
    pub fn push(&mut self, row: R) {
        self.rows.push(row);
        self.extra_cells
            .push(vec![String::new(); self.extra_columns.len()]);
    }

    /// Columns present in the source but not declared by the model
    pub fn extra_columns(&self) -> &[String] {
        &self.extra_columns
    }

    /// Bind every row of a table
    pub fn from_table(table: &LoopTable) -> Result<Self> {
        let rows = (0..table.len())
            .map(|i| R::from_row(table, i))
            .collect::<Result<Vec<_>>>()?;
        let declared = R::columns();
        let extra_idx: Vec<usize> = table
            .columns()
            .iter()
            .enumerate()
            .filter(|(_, c)| !declared.contains(&c.as_str()))
            .map(|(i, _)| i)
            .collect();
        let extra_columns = extra_idx
            .iter()
            .map(|&i| table.columns()[i].clone())
            .collect();
        let extra_cells = table
            .rows()
            .iter()
            .map(|r| extra_idx.iter().map(|&i| r[i].clone()).collect())
            .collect();
        Ok(Self {
            rows,
            extra_columns,
            extra_cells,
        })
    }

    /// Tabular view: declared columns (absent optionals dropped) then extras
    pub fn to_table(&self) -> LoopTable {
        let cells: Vec<Vec<Option<String>>> = self.rows.iter().map(R::to_cells).collect();
        let keep: Vec<usize> = (0..R::columns().len())
            .filter(|&i| cells.is_empty() || cells.iter().any(|r| r[i].is_some()))
            .collect();

        let mut table = LoopTable::new(
            keep.iter()
                .map(|&i| R::columns()[i])
                .chain(self.extra_columns.iter().map(String::as_str)),
        );
        for (row, extras) in cells.into_iter().zip(&self.extra_cells) {
            let mut out: Vec<String> = keep
                .iter()
                .map(|&i| row[i].clone().unwrap_or_default())
                .collect();
            out.extend(extras.iter().cloned());
            // widths agree by construction
            let _ = table.push_row(out);
        }
        table
    }

    /// String view of one column, addressed by attribute or STAR name
    pub fn column(&self, name: &str) -> Result<Vec<String>> {
        let declared = R::columns()
            .iter()
            .zip(R::attributes())
            .position(|(star, attr)| *star == name || *attr == name);
        if let Some(i) = declared {
            return Ok(self
                .rows
                .iter()
                .map(|r| r.to_cells().swap_remove(i).unwrap_or_default())
                .collect());
        }
        let extra = self
            .extra_columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| {
                RelionError::schema(format!("{}.{name}", R::BLOCK), "no such column")
            })?;
        Ok(self.extra_cells.iter().map(|r| r[extra].clone()).collect())
    }

    /// Typed view of one column
    pub fn column_as<T: StarValue>(&self, name: &str) -> Result<Vec<T>> {
        self.column(name)?
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                bind_field(|| format!("{}[{i}].{name}", R::BLOCK), Some(raw), None)
            })
            .collect()
    }

    /// Bind the loop block of a document; it must be present
    pub fn from_document(doc: &StarDocument) -> Result<Self> {
        match doc.block(R::BLOCK) {
            Some(StarBlock::Loop(table)) => Self::from_table(table),
            // RELION writes an empty loop-less block for some empty tables
            Some(StarBlock::Single(record)) if record.is_empty() => Ok(Self::default()),
            Some(StarBlock::Single(_)) => Err(RelionError::schema(
                R::BLOCK,
                "expected a loop, found a single record",
            )),
            None => Err(RelionError::schema(R::BLOCK, "required block is missing")),
        }
    }

    /// Bind the loop block of a document, treating absence as empty
    pub fn from_document_or_empty(doc: &StarDocument) -> Result<Self> {
        if doc.block(R::BLOCK).is_none() {
            return Ok(Self::default());
        }
        Self::from_document(doc)
    }

    pub fn to_block(&self) -> StarBlock {
        StarBlock::Loop(self.to_table())
    }
}

impl<R: LoopRow> FromIterator<R> for Loop<R> {
    fn from_iter<I: IntoIterator<Item = R>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a, R> IntoIterator for &'a Loop<R> {
    type Item = &'a R;
    type IntoIter = std::slice::Iter<'a, R>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

/// A model bound to a whole STAR file
pub trait StarModel: Sized {
    fn from_document(doc: &StarDocument) -> Result<Self>;

    fn to_document(&self) -> StarDocument;

    /// Deterministic well-formed instance of `size` rows per loop
    fn example(size: usize) -> Self;

    fn validate_str(text: &str) -> Result<Self> {
        Self::from_document(&StarDocument::parse(text)?)
    }

    fn validate_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RelionError::MissingOutput(path.to_path_buf()));
        }
        let doc = StarDocument::read(path)?;
        Self::from_document(&doc).with_context(|| format!("Invalid {}", path.display()))
    }

    fn to_star_string(&self) -> String {
        self.to_document().to_star_string()
    }

    fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        self.to_document().write(path)
    }
}

impl<R: LoopRow> StarModel for Loop<R> {
    fn from_document(doc: &StarDocument) -> Result<Self> {
        Loop::from_document(doc)
    }

    fn to_document(&self) -> StarDocument {
        let mut doc = StarDocument::new();
        doc.insert(R::BLOCK, self.to_block());
        doc
    }

    fn example(size: usize) -> Self {
        (0..size).map(R::example).collect()
    }
}

/// Declare a record bound to a single-record STAR block.
#[macro_export]
macro_rules! star_record {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $block:literal {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty => $star:literal $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::star::StarRecord for $name {
            const BLOCK: &'static str = $block;

            fn field_names() -> &'static [&'static str] {
                &[$($star),*]
            }

            fn from_record(record: &$crate::star::SingleRecord) -> $crate::error::Result<Self> {
                Ok(Self {
                    $(
                        $field: {
                            let default: Option<$ty> = None $(.or(Some($default)))?;
                            $crate::star::bind_field(
                                || format!("{}.{}", $block, $star),
                                record.get($star),
                                default,
                            )?
                        },
                    )*
                })
            }

            fn to_record(&self) -> $crate::star::SingleRecord {
                #[allow(unused_mut)]
                let mut record = $crate::star::SingleRecord::new();
                $(
                    if let Some(v) = $crate::star::StarValue::to_star_opt(&self.$field) {
                        record.set($star, v);
                    }
                )*
                record
            }

            fn example(index: usize) -> Self {
                let _ = index;
                Self {
                    $( $field: <$ty as $crate::star::StarValue>::example(index), )*
                }
            }
        }

        impl $crate::star::StarModel for $name {
            fn from_document(doc: &$crate::star::StarDocument) -> $crate::error::Result<Self> {
                <Self as $crate::star::StarRecord>::from_document(doc)
            }

            fn to_document(&self) -> $crate::star::StarDocument {
                let mut doc = $crate::star::StarDocument::new();
                doc.insert($block, <Self as $crate::star::StarRecord>::to_block(self));
                doc
            }

            fn example(size: usize) -> Self {
                <Self as $crate::star::StarRecord>::example(size)
            }
        }
    };
}

/// Declare one row of a loop STAR block.
#[macro_export]
macro_rules! star_loop {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident in $block:literal {
            $(
                $(#[$fmeta:meta])*
                $fvis:vis $field:ident : $ty:ty => $star:literal $(= $default:expr)?
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        $vis struct $name {
            $(
                $(#[$fmeta])*
                $fvis $field: $ty,
            )*
        }

        impl $crate::star::LoopRow for $name {
            const BLOCK: &'static str = $block;

            fn columns() -> &'static [&'static str] {
                &[$($star),*]
            }

            fn attributes() -> &'static [&'static str] {
                &[$(stringify!($field)),*]
            }

            fn from_row(table: &$crate::star::LoopTable, row: usize) -> $crate::error::Result<Self> {
                Ok(Self {
                    $(
                        $field: {
                            let default: Option<$ty> = None $(.or(Some($default)))?;
                            $crate::star::bind_field(
                                || format!("{}[{}].{}", $block, row, $star),
                                table.cell(row, $star),
                                default,
                            )?
                        },
                    )*
                })
            }

            fn to_cells(&self) -> Vec<Option<String>> {
                vec![$($crate::star::StarValue::to_star_opt(&self.$field)),*]
            }

            fn example(index: usize) -> Self {
                Self {
                    $( $field: <$ty as $crate::star::StarValue>::example(index), )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::star::StarValue;

    crate::star_record! {
        #[derive(Debug, Clone, PartialEq)]
        struct General in "general" {
            name: String => "rlnName",
            count: u32 => "rlnCount" = 3,
            scale: Option<f64> => "rlnScale",
        }
    }

    crate::star_loop! {
        #[derive(Debug, Clone, PartialEq)]
        struct Row in "rows" {
            image: String => "rlnImageName",
            class_number: i32 => "rlnClassNumber",
            defocus: Option<f64> => "rlnDefocusU",
        }
    }

    #[test]
    fn test_record_defaults_and_optionals() {
        let g = General::validate_str("data_general\n_rlnName abc\n").unwrap();
        assert_eq!(g.name, "abc");
        assert_eq!(g.count, 3);
        assert_eq!(g.scale, None);
    }

    #[test]
    fn test_record_reports_block_qualified_path() {
        let err = General::validate_str("data_general\n_rlnCount 1\n").unwrap_err();
        assert!(err.to_string().contains("general.rlnName"), "{err}");

        let err = General::validate_str("data_general\n_rlnName a\n_rlnCount x\n").unwrap_err();
        assert!(err.to_string().contains("general.rlnCount"), "{err}");

        let err = General::validate_str("data_other\n_rlnName a\n").unwrap_err();
        assert!(err.to_string().contains("required block"), "{err}");
    }

    #[test]
    fn test_loop_preserves_extra_columns() {
        let text = "data_rows\nloop_\n_rlnImageName #1\n_rlnClassNumber #2\n_rlnAngleRot #3\n\
                    1@a.mrcs 1 10.5\n2@a.mrcs 2 -3.0\n";
        let rows = Loop::<Row>::validate_str(text).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows.extra_columns(), ["rlnAngleRot".to_string()]);
        assert_eq!(rows.column("rlnAngleRot").unwrap(), vec!["10.5", "-3.0"]);
        assert_eq!(rows.column_as::<i32>("class_number").unwrap(), vec![1, 2]);

        let table = rows.to_table();
        assert_eq!(table.columns(), ["rlnImageName", "rlnClassNumber", "rlnAngleRot"]);

        let again = Loop::<Row>::validate_str(&rows.to_star_string()).unwrap();
        assert_eq!(again, rows);
    }

    #[test]
    fn test_loop_row_error_names_row() {
        let text = "data_rows\nloop_\n_rlnImageName #1\n_rlnClassNumber #2\na 1\nb two\n";
        let err = Loop::<Row>::validate_str(text).unwrap_err();
        assert!(err.to_string().contains("rows[1].rlnClassNumber"), "{err}");
    }

    #[test]
    fn test_example_is_well_formed() {
        let rows = Loop::<Row>::example(4);
        assert_eq!(rows.len(), 4);
        let again = Loop::<Row>::validate_str(&rows.to_star_string()).unwrap();
        assert_eq!(again, rows);
        assert_eq!(String::example(1), rows.rows()[1].image);
    }
}
