pub mod cx;
pub use cx::Cx;

pub mod data;
pub use data::{DataBlock, DataBlocks, DataTree};

mod error;
pub use error::{Error, ErrorKind};

pub mod graph;
pub use graph::SchemaGraph;

pub mod schema;
pub use schema::Schema;

pub mod value;
pub use value::Value;

/// A Result type alias that uses Bubbly's [`Error`] type.
pub type Result<T, E = Error> = core::result::Result<T, E>;
