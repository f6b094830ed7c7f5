//! Channel and feed types exchanged with the remote telemetry provider
//!
//! Everything coming from the provider is loosely typed. [`RawFeed`] keeps
//! a feed entry as received and [`sanitize`] is the only way to turn it
//! into a [`FeedRecord`], which is what gets persisted.
//!
//! The wire format follows https://www.mathworks.com/help/thingspeak/readdata.html

mod channel;
mod feed;
mod sanitize;

pub use channel::*;
pub use feed::*;
pub use sanitize::{sanitize, sanitize_at};
