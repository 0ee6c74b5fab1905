//! Cluster Object Store
//!
//! A narrow, object-safe view of the Kubernetes API used by the
//! HyperConverged operator and its admission webhook.
//!
//! # Example
//!
//! ```no_run
//! use cluster_store::{typed, KubeObjectStore, ObjectStore};
//! use k8s_openapi::api::core::v1::ConfigMap;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeObjectStore::new(client);
//!
//! let cm: Option<ConfigMap> = typed::get_opt(&store, Some("kubevirt-hyperconverged"), "virtio-win").await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Dynamic core**: every call works on `DynamicObject` + `ApiResource`
//! - **Typed helpers**: `typed::*` convert to and from concrete resource types
//! - **Dry-run**: updates and deletes can be validated without persisting
//! - **Mock**: `MockObjectStore` behind the `test-util` feature

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
pub mod typed;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeObjectStore;
pub use error::StoreError;
pub use store_trait::ObjectStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockObjectStore, StoreCall, Verb};
