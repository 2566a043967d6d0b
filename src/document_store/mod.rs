mod models;
mod schema;
mod store;
mod trait_def;

pub use models::*;
pub use schema::{DOCUMENT_SCHEMA, TRACKS_TABLE};
pub use store::SqliteDocumentStore;
pub use trait_def::DocumentStore;

#[cfg(test)]
pub use trait_def::MockDocumentStore;
