//! Trait definitions for the Atelier engine.
//!
//! The refinement loop talks to the outside world through three seams:
//! [`AtelierDriver`] streams model output, [`PersistenceGateway`] stores
//! records and blobs, and [`Sanitizer`] cleans untrusted markup before it is
//! rendered or displayed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod gateway;
mod sanitize;

pub use driver::{AtelierDriver, EventStream, FinishReason, StreamEvent};
pub use gateway::{BlobKind, BlobOwner, PersistenceGateway};
pub use sanitize::{PassThrough, Sanitizer};
