//! Shared fixture data for end-to-end tests
//!
//! The scenario catalog: artist A plays pop and rock, B plays rock and jazz,
//! C plays pop. One track has a messy multi-artist field, one has no genre
//! and one repeats an earlier track id under another genre, as the public
//! dataset does.

use super::fixtures::TrackRow;

pub const SCENARIO_TRACKS: &[TrackRow] = &[
    TrackRow::new("t1", "A", "A Pop Song", "pop", 50),
    TrackRow::new("t2", "A", "A Rock Song", "rock", 40),
    TrackRow::new("t3", "B", "B Rock Song", "rock", 70),
    TrackRow::new("t4", "B", "B Jazz Song", "jazz", 60),
    TrackRow::new("t5", "C", "C Pop Song", "pop", 90),
    TrackRow::new("t6", "X, Y, , Z", "Collab", "indie", 10),
    TrackRow::new("t7", "A", "No Genre", "", 30),
    TrackRow::new("t1", "A", "A Pop Song", "metal", 50),
];

/// Rows in [`SCENARIO_TRACKS`], duplicates included.
pub const SCENARIO_ROWS: usize = 8;

/// Distinct track ids in [`SCENARIO_TRACKS`].
pub const SCENARIO_DOCUMENTS: u64 = 7;

/// Documents that make it into the graph: all but the genre-less one.
pub const SCENARIO_SONGS: u64 = 6;
