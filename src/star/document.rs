//! Untyped STAR documents: reading and writing.
//!
//! A document is an ordered list of named blocks. Each block is either a
//! single record (`_field value` pairs) or a loop (`loop_` followed by
//! `_column #i` headers and whitespace-separated rows). Field and column names
//! are stored without their leading underscore.

use crate::error::{RelionError, Result, ResultExt};
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

/// Version comment RELION 5 writes at the top of every block.
pub const STAR_VERSION_LINE: &str = "# version 50001";

/// A single-record block: ordered field → value pairs.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SingleRecord {
    fields: Vec<(String, String)>,
}

impl SingleRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set a field, replacing an existing value in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A loop block: named columns and rows of string cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LoopTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl LoopTable {
    /// Create an empty table with the given columns
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All cells of one column, in row order
    pub fn column(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// A single cell, `None` if the column does not exist
    pub fn cell(&self, row: usize, column: &str) -> Option<&str> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Append a row; its width must match the column count
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(RelionError::schema(
                "loop",
                format!(
                    "row has {} cells but the loop declares {} columns",
                    row.len(),
                    self.columns.len()
                ),
            ));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Body of a data block
#[derive(Debug, Clone, PartialEq)]
pub enum StarBlock {
    Single(SingleRecord),
    Loop(LoopTable),
}

impl StarBlock {
    pub fn as_single(&self) -> Option<&SingleRecord> {
        match self {
            StarBlock::Single(r) => Some(r),
            StarBlock::Loop(_) => None,
        }
    }

    pub fn as_loop(&self) -> Option<&LoopTable> {
        match self {
            StarBlock::Loop(t) => Some(t),
            StarBlock::Single(_) => None,
        }
    }
}

/// An ordered collection of named STAR blocks
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StarDocument {
    blocks: Vec<(String, StarBlock)>,
}

/// Parser state while walking lines
enum ParseState {
    /// Outside any block, or in a block whose kind is not known yet
    Open,
    /// Inside a single-record block
    Single,
    /// Reading `_column` headers after `loop_`
    LoopHeader,
    /// Reading loop rows
    LoopRows,
}

impl StarDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse STAR text
    pub fn parse(text: &str) -> Result<Self> {
        let mut doc = StarDocument::new();
        let mut current: Option<(String, StarBlock)> = None;
        let mut state = ParseState::Open;

        for (idx, line) in text.lines().enumerate() {
            let lineno = idx + 1;
            let tokens = tokenize(line, lineno)?;
            let Some(first) = tokens.first() else {
                continue;
            };

            if let Some(name) = first.strip_prefix("data_") {
                if let Some((n, b)) = current.take() {
                    doc.insert(n, b);
                }
                current = Some((name.to_string(), StarBlock::Single(SingleRecord::new())));
                state = ParseState::Open;
                continue;
            }

            let Some((block_name, block)) = current.as_mut() else {
                return Err(syntax(lineno, format!("{first:?} outside of a data block")));
            };

            if first == "loop_" {
                let fresh = matches!(state, ParseState::Open)
                    && matches!(&*block, StarBlock::Single(r) if r.is_empty());
                if !fresh {
                    return Err(syntax(
                        lineno,
                        format!("block {block_name:?} cannot hold more than one body"),
                    ));
                }
                *block = StarBlock::Loop(LoopTable::default());
                state = ParseState::LoopHeader;
                continue;
            }

            if let Some(field) = first.strip_prefix('_') {
                match (&state, block) {
                    (ParseState::LoopHeader, StarBlock::Loop(table)) => {
                        table.columns.push(field.to_string());
                    }
                    (ParseState::Open | ParseState::Single, StarBlock::Single(record)) => {
                        let value = tokens.get(1).ok_or_else(|| {
                            syntax(lineno, format!("field _{field} has no value"))
                        })?;
                        record.set(field, value.clone());
                        state = ParseState::Single;
                    }
                    _ => {
                        return Err(syntax(
                            lineno,
                            format!("unexpected field _{field} after loop rows"),
                        ))
                    }
                }
                continue;
            }

            match (&state, block) {
                (ParseState::LoopHeader | ParseState::LoopRows, StarBlock::Loop(table)) => {
                    if tokens.len() != table.columns.len() {
                        return Err(syntax(
                            lineno,
                            format!(
                                "row has {} values but loop {block_name:?} has {} columns",
                                tokens.len(),
                                table.columns.len()
                            ),
                        ));
                    }
                    table.rows.push(tokens);
                    state = ParseState::LoopRows;
                }
                _ => {
                    return Err(syntax(lineno, format!("unexpected value {first:?}")));
                }
            }
        }

        if let Some((n, b)) = current.take() {
            doc.insert(n, b);
        }
        Ok(doc)
    }

    /// Read and parse a STAR file
    pub fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(RelionError::from)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn block(&self, name: &str) -> Option<&StarBlock> {
        self.blocks.iter().find(|(n, _)| n == name).map(|(_, b)| b)
    }

    /// Insert a block, replacing one with the same name in place
    pub fn insert(&mut self, name: impl Into<String>, block: StarBlock) {
        let name = name.into();
        match self.blocks.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = block,
            None => self.blocks.push((name, block)),
        }
    }

    pub fn blocks(&self) -> impl Iterator<Item = (&str, &StarBlock)> {
        self.blocks.iter().map(|(n, b)| (n.as_str(), b))
    }

    pub fn block_names(&self) -> Vec<&str> {
        self.blocks.iter().map(|(n, _)| n.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Serialize in RELION's layout
    pub fn to_star_string(&self) -> String {
        let mut out = String::new();
        for (name, block) in &self.blocks {
            let _ = write!(out, "\n{STAR_VERSION_LINE}\n\ndata_{name}\n\n");
            match block {
                StarBlock::Single(record) => write_single(&mut out, record),
                StarBlock::Loop(table) => write_loop(&mut out, table),
            }
            out.push('\n');
        }
        out
    }

    /// Write to a file, replacing it
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_star_string())
            .map_err(RelionError::from)
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

fn write_single(out: &mut String, record: &SingleRecord) {
    let width = record.fields.iter().map(|(k, _)| k.len()).max().unwrap_or(0) + 1;
    for (key, value) in &record.fields {
        let _ = writeln!(out, "_{key:<width$} {}", quote(value));
    }
}

fn write_loop(out: &mut String, table: &LoopTable) {
    out.push_str("loop_ \n");
    for (i, col) in table.columns.iter().enumerate() {
        let _ = writeln!(out, "_{col} #{} ", i + 1);
    }
    let quoted: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| row.iter().map(|c| quote(c)).collect())
        .collect();
    let widths: Vec<usize> = (0..table.columns.len())
        .map(|i| quoted.iter().map(|r| r[i].len()).max().unwrap_or(0))
        .collect();
    for row in &quoted {
        let mut line = String::new();
        for (cell, width) in row.iter().zip(&widths) {
            let _ = write!(line, "{cell:<width$}  ");
        }
        out.push_str(line.trim_end());
        out.push_str(" \n");
    }
}

/// Quote a value when it would not survive tokenization bare
///
/// A quote only closes a value when whitespace follows it, so the delimiter
/// must never appear before whitespace inside the value.
fn quote(value: &str) -> String {
    let needs_quote = value.is_empty()
        || value.chars().any(char::is_whitespace)
        || value.starts_with(['#', '_', '"', '\''])
        || value.starts_with("data_")
        || value == "loop_";
    if !needs_quote {
        return value.to_string();
    }
    if value.contains(['\n', '\r']) {
        warn!("Line break in STAR value {value:?} will not read back");
    }
    let closes_early = |q: char| {
        let mut chars = value.chars().peekable();
        while let Some(c) = chars.next() {
            if c == q && chars.peek().is_some_and(|n| n.is_whitespace()) {
                return true;
            }
        }
        false
    };
    let delimiter = ['"', '\'']
        .into_iter()
        .find(|&q| !closes_early(q))
        .unwrap_or_else(|| {
            warn!("STAR value {value:?} has both quote kinds before whitespace");
            '"'
        });
    format!("{delimiter}{value}{delimiter}")
}

fn syntax(line: usize, message: String) -> RelionError {
    RelionError::StarSyntax { line, message }
}

/// Split a line into tokens, honouring quotes and `#` comments.
pub(crate) fn tokenize(line: &str, lineno: usize) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut chars = line.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c == '#' {
            break;
        }
        if c == '"' || c == '\'' {
            chars.next();
            let mut value = String::new();
            let mut closed = false;
            while let Some((_, ch)) = chars.next() {
                if ch == c {
                    // a quote only closes when followed by whitespace or end of line
                    let at_boundary = chars.peek().map_or(true, |(_, n)| n.is_whitespace());
                    if at_boundary {
                        closed = true;
                        break;
                    }
                }
                value.push(ch);
            }
            if !closed {
                return Err(syntax(lineno, format!("unterminated quote at column {}", start + 1)));
            }
            tokens.push(value);
            continue;
        }
        let mut end = line.len();
        while let Some(&(i, ch)) = chars.peek() {
            if ch.is_whitespace() {
                end = i;
                break;
            }
            chars.next();
        }
        tokens.push(line[start..end].to_string());
    }
    Ok(tokens)
}
