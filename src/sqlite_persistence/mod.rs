mod versioned_schema;

pub use versioned_schema::{
    index_exists, open_versioned_db, Column, ForeignKey, SqlType, Table,
    VersionedSchema, BASE_DB_VERSION,
};
