pub mod api;
pub mod collect;
pub mod complaints;
pub mod core;
pub mod scraping;
pub mod storage;
pub mod tools;

// --- Primary core exports ---
pub use core::types;
pub use core::types::*;
pub use core::AppState;

pub use collect::{run_session, CollectError, CollectionReport, CollectorSettings, Target};
pub use complaints::{parse_dump, parse_file};
