//! Typed object mapping over the amoCRM REST API.
//!
//! Entities in the CRM ([leads](schema::Lead), [contacts](schema::Contact), ...) are described by
//! [models](Model), whose attributes are accessed through typed descriptors. Models are fetched
//! and saved through a [`Client`]:
//!
//! ```ignore
//! use amocrm::{config::Options, schema::Contact, Model};
//!
//! let client = options.connect().await?;
//! let mut contact = client.contacts().get(42).await?;
//! let company = client.resolve_foreign(&mut contact, &Contact::COMPANY).await?;
//! contact.set(&Contact::NAME, "John Smith");
//! client.save(&mut contact).await?;
//! ```
//!
//! Attributes are loaded lazily and only modified attributes are written back. With the `testing`
//! feature, the [`mock`] module provides an in-memory implementation of the API for tests.

pub mod api;
pub mod config;
pub mod fields;
pub mod manager;
#[cfg(any(test, feature = "testing"))]
pub mod mock;
pub mod schema;

pub use amocrm_derive::Model;
pub use api::{ApiError, Client, Credentials};
pub use fields::Model;
pub use manager::{Manager, Query};

/// Install a global `tracing` subscriber, configured by the `RUST_LOG` environment variable.
///
/// This can safely be called more than once; only the first call has any effect.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
