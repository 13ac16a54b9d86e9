pub mod client;
pub mod errors;
pub mod loader;
pub mod pacing;
pub mod pipeline;
pub mod types;

pub use client::{BROWSER_USER_AGENT, fetch, fetch_with_timeout, get_client};
pub use errors::FetchError;
pub use loader::{HttpPageLoader, PageLoader};
pub use pacing::RequestPacer;
pub use types::PageResponse;
