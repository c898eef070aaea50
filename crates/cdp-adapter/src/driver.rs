//! Seams between the workflow layers and a live browser.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::commands::{ElementProbe, ElementQuery};
use crate::error::AdapterError;

/// One page/tab of a browser session.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Loads `url` and waits for the navigation to settle, up to `deadline`.
    async fn navigate(&self, url: &str, deadline: Duration) -> Result<(), AdapterError>;

    async fn current_url(&self) -> Result<String, AdapterError>;

    /// Single non-blocking look for a visible, interactable match.
    async fn probe(&self, query: &ElementQuery) -> Result<Option<ElementProbe>, AdapterError>;

    async fn click(&self, query: &ElementQuery) -> Result<(), AdapterError>;

    /// Replaces the element's value with `text`.
    async fn fill(&self, query: &ElementQuery, text: &str) -> Result<(), AdapterError>;
}

/// A launched browser with one working page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    fn page(&self) -> Arc<dyn PageDriver>;

    /// Shuts the browser down. Safe to call more than once.
    async fn close(&self) -> Result<(), AdapterError>;
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LaunchOptions {
    pub headless: bool,
}

#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Box<dyn BrowserSession>, AdapterError>;
}
