pub mod browser_manager;
pub mod browser_page;
pub mod challenge;
pub mod session_store;
pub mod strategies;

pub use browser_manager::{find_chrome_executable, LaunchOptions};
pub use browser_page::{BrowserPage, LoginSession};
