//! Locator - multi-strategy element resolution
//!
//! An element is described by an ordered list of [`LocatorStrategy`]
//! values. The resolver polls each strategy until its own deadline and
//! moves on to the next one only after that deadline passes:
//! - ARIA role + accessible name (usually first)
//! - Visible text, optionally scoped to a selector
//! - Test id and raw CSS selectors as last resorts

pub mod errors;
pub mod resolver;
pub mod strategies;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use strategies::*;
pub use types::*;
