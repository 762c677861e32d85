//! # ham-core
//!
//! Core types, settings and error handling for the ham workspace.
//!
//! - **Arguments**: the dynamic call model ([`ParameterSet`] and [`Arguments`])
//!   used by the task runners' dispatch rule
//! - **Errors**: [`HamError`] and the crate [`Result`] alias
//! - **Settings**: [`RuntimeSettings`], the explicit context object passed to
//!   the runner instead of process-wide flags
//! - **Logging**: `tracing-subscriber` setup driven by the settings
//!
//! ## Example
//!
//! ```rust
//! use ham_core::{Arguments, ParameterSet, RuntimeSettings};
//! use serde_json::json;
//!
//! let settings = RuntimeSettings::new().max_workers(4);
//! assert!(settings.validate().is_ok());
//!
//! let args: Arguments = ParameterSet::from(json!({"url": "https://example.com"})).into();
//! let url: String = args.kwarg("url").unwrap();
//! assert_eq!(url, "https://example.com");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod args;
pub mod errors;
pub mod logging;
pub mod settings;

// Re-exports for convenience
pub use args::{Arguments, IndexedArgs, KeywordArgs, ParameterSet, Value};
pub use errors::{HamError, Result};
pub use logging::{init_logging, LogFormat, LoggingConfig};
pub use settings::{RetrySettings, RuntimeSettings};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Arguments, HamError, LoggingConfig, ParameterSet, Result, RetrySettings, RuntimeSettings,
    };
}
