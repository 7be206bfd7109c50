pub mod driver;
pub use driver::{Postgres, Provider, Sqlite};

mod gql;

pub mod query;
pub use query::Selection;

mod store;
pub use store::Store;

pub use bubbly_core::{
    data, graph, schema, Cx, DataBlock, DataBlocks, Error, ErrorKind, Result, Value,
};
