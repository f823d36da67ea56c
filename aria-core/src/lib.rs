pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod models;
pub mod promoter;
pub mod store;

pub use config::AriaConfig;
pub use engine::{HabitEngine, LoggedIntent};
pub use error::{AriaError, Result};
pub use ledger::{FrequencyLedger, Observation};
pub use promoter::{HabitPromoter, Promotion, SweepReport};
pub use store::{create_store, DocumentStore, MemoryStore, PgStore};
