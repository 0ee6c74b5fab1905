//! HyperConverged Operator library
//!
//! Everything except process start-up lives here so the webhook can reuse
//! the spec builders and the tests can drive the pipeline against an
//! in-memory store.

pub mod assets;
pub mod backoff;
pub mod conditions;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod labels;
pub mod operand_handler;
pub mod operands;
pub mod patch;
pub mod placement;
pub mod reconciler;
pub mod related;
pub mod request;
pub mod tls;
pub mod watcher;

pub use config::OperatorConfig;
pub use error::ControllerError;
