//! Bulk loading for the ARIA ledger: demo seeding and JSON-lines replay.

pub mod replay;
pub mod seed;

pub use replay::{replay_file, replay_lines, ReplayReport};
pub use seed::{seed, SeedReport};
