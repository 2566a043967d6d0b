mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::GRAPH_SCHEMA;
pub use store::SqliteGraphStore;
pub use trait_def::GraphStore;

#[cfg(test)]
pub use trait_def::MockGraphStore;
