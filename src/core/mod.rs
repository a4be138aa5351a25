pub mod app_state;
pub mod config;
pub mod logging;
pub mod status;
pub mod types;
pub mod url_norm;

pub use app_state::AppState;
pub use status::{JobControl, JobStatus};
