//! STAR schema layer
//!
//! This is the only part of the crate that knows STAR syntax. Everything else
//! consumes typed records produced here.
//!
//! - [`StarDocument`] - ordered blocks, each a [`SingleRecord`] or a [`LoopTable`]
//! - [`StarValue`] - scalar coercions (`String`, integers, `f64`, `bool`, `PathBuf`, `Option<T>`)
//! - [`StarRecord`] / [`LoopRow`] - typed blocks declared with
//!   [`star_record!`](crate::star_record) and [`star_loop!`](crate::star_loop)
//! - [`Loop`] - rows of a loop model with columnar access and extra columns kept
//! - [`StarModel`] - whole-file models with `validate_file`, `write` and `example`

pub mod document;
pub mod schema;
pub mod value;

pub use document::{LoopTable, SingleRecord, StarBlock, StarDocument, STAR_VERSION_LINE};
pub use schema::{bind_field, Loop, LoopRow, StarModel, StarRecord};
pub use value::StarValue;
