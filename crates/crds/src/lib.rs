//! HyperConverged CRD Definitions
//!
//! The user-facing `HyperConverged` custom resource together with typed
//! renditions of every downstream kind the operator renders from it.

pub mod cdi;
pub mod common;
pub mod conditions;
pub mod console;
pub mod hyperconverged;
pub mod image_stream;
pub mod kubevirt;
pub mod migration;
pub mod network_addons;
pub mod schema;
pub mod ssp;

pub use cdi::*;
pub use common::*;
pub use conditions::*;
pub use console::*;
pub use hyperconverged::*;
pub use image_stream::*;
pub use kubevirt::*;
pub use migration::*;
pub use network_addons::*;
pub use ssp::*;
