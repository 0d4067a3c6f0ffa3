//! Error types for the Atelier engine.
//!
//! # Error Hierarchy
//!
//! All errors follow the `ErrorKind` + wrapper struct pattern:
//! - `*ErrorKind` enum defines specific error conditions
//! - `*Error` struct wraps the kind with source location tracking
//! - All errors use `#[track_caller]` for automatic location capture
//!
//! Provider, persistence, cancellation and renderer faults abort a run.
//! Artifacts that fail to render are not errors at all; the renderer returns
//! them as data so the refinement loop can feed them back to the model.
//!
//! # Examples
//!
//! ```
//! use atelier_error::{AtelierResult, ProviderError, ProviderErrorKind};
//!
//! fn open_stream() -> AtelierResult<()> {
//!     Err(ProviderError::new(ProviderErrorKind::Stream("connection reset".into())))?
//! }
//!
//! match open_stream() {
//!     Ok(()) => println!("streaming"),
//!     Err(e) => eprintln!("Error: {}", e.summary()),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod persistence;
mod provider;
mod refine;
mod render;
mod storage;

pub use config::ConfigError;
pub use error::{AtelierError, AtelierErrorKind, AtelierResult};
pub use persistence::{PersistenceError, PersistenceErrorKind};
pub use provider::{ProviderError, ProviderErrorKind, VendorDetail};
pub use refine::{RefineError, RefineErrorKind};
pub use render::{RenderError, RenderErrorKind};
pub use storage::{StorageError, StorageErrorKind};
