//! Element query adapter over a live browser session.
//!
//! Everything the scrapers need from the rendering engine goes through
//! [`BrowserSession`]: look elements up, read their text or markup, click them
//! and juggle a secondary tab. Waiting is layered on top in [`wait`].

pub mod chrome;
#[cfg(test)]
pub(crate) mod fake;
pub mod wait;

use std::fmt::Display;

use async_trait::async_trait;

pub use chrome::ChromeSession;
pub use wait::Waiter;

#[derive(Debug, thiserror::Error)]
pub enum BrowserError {
    #[error("Browser driver error: {0}")]
    Driver(String),
    #[error("Failed to launch browser: {0}")]
    Launch(String),
    #[error("Timed out after {waited_ms}ms waiting for {condition}")]
    Timeout { condition: String, waited_ms: u128 },
    #[error("No element matches {0}")]
    NotFound(Locator),
    #[error("No secondary tab is open")]
    NoSecondaryTab,
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Driver(err.to_string())
    }
}

/// A stable query for elements on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(&'static str),
    XPath(&'static str),
}

impl Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(css) => write!(f, "css `{}`", css),
            Locator::XPath(xpath) => write!(f, "xpath `{}`", xpath),
        }
    }
}

/// One browser session with a primary tab and at most one secondary tab.
///
/// Element handles never leave the implementation: callers get serialized
/// markup or text back, so nothing goes stale between calls. Every lookup
/// hits the live DOM again.
#[async_trait]
pub trait BrowserSession: Send {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Outer HTML of every element matching `locator`, in document order.
    async fn find_html(&mut self, locator: &Locator) -> Result<Vec<String>, BrowserError>;

    /// Rendered text of the first match, `None` when nothing matches.
    async fn text(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError>;

    /// Current `value` of the first matching form control.
    async fn value(&mut self, locator: &Locator) -> Result<Option<String>, BrowserError>;

    async fn is_present(&mut self, locator: &Locator) -> Result<bool, BrowserError>;

    async fn is_visible(&mut self, locator: &Locator) -> Result<bool, BrowserError>;

    /// Clicks the first match through an injected script, which sidesteps
    /// overlays intercepting a native click.
    async fn click(&mut self, locator: &Locator) -> Result<(), BrowserError>;

    /// Picks the `<option>` with the given value on a `<select>` and fires `change`.
    async fn select(&mut self, locator: &Locator, value: &str) -> Result<(), BrowserError>;

    /// Opens `url` in a new tab and focuses it.
    async fn open_tab(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Closes the secondary tab and hands focus back to the primary one.
    async fn close_tab(&mut self) -> Result<(), BrowserError>;

    async fn page_source(&mut self) -> Result<String, BrowserError>;

    async fn shutdown(&mut self) -> Result<(), BrowserError>;
}
