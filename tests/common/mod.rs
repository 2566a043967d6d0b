//! Common test infrastructure
//!
//! End-to-end tests run the real pipeline (CSV file, document store, graph
//! store) inside a temporary data directory. Tests should only import from
//! this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestEnv, SCENARIO_TRACKS};
//!
//! #[test]
//! fn test_pipeline() {
//!     let env = TestEnv::new();
//!     env.load(SCENARIO_TRACKS, None);
//!     let report = env.build_graph();
//!     assert!(report.failed_batches.is_empty());
//! }
//! ```

mod constants;
mod env;
mod fixtures;

// Public API - this is what tests import
#[allow(unused_imports)]
pub use constants::*;
pub use env::TestEnv;
#[allow(unused_imports)]
pub use fixtures::{write_dataset, TrackRow};
