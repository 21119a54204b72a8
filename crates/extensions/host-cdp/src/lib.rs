//! # webreplay CDP host
//!
//! [`CdpPage`] implements [`webreplay_protocols::PageHandle`] for a live
//! Chrome tab over the Chrome DevTools Protocol.
//!
//! ## Usage
//!
//! 1. Start Chrome with remote debugging:
//!    ```bash
//!    chrome --remote-debugging-port=9222
//!    ```
//!
//! 2. Attach and hand the page to an engine:
//!    ```rust,ignore
//!    let page = Arc::new(CdpPage::connect("http://localhost:9222").await?);
//!    let engine = ActionEngine::new(page, config.engine.clone());
//!    ```

mod client;
mod error;
mod page;
mod protocol;
mod scripts;
mod session;

pub use client::CdpClient;
pub use error::CdpError;
pub use page::CdpPage;
pub use protocol::{CdpResponse, PageInfo};
pub use session::PageSession;
