//! NNTP read gateway for forum content
//!
//! Exposes a community platform's threaded content to standard
//! newsreaders: forum sections become newsgroups, posts become articles.
//! The gateway is read-only on the wire (no posting); a background
//! rebuild pipeline populates the article index from source content and
//! a retention job keeps it bounded in size and age.
//!
//! Module map:
//! - [`index`] — group/article rows, record ids, the store trait
//! - [`extension`] — per-content-type capability objects (filter,
//!   render, rebuild)
//! - [`access`] — content-type-keyed visibility dispatch
//! - [`adapter`] — the NNTP verb contracts over the index
//! - [`jobs`] — retention and rebuild with per-identity exclusion
//! - [`admin`] — thin administrative triggers
//! - [`service`] — listeners, worker pool, TLS hot reload, engine

pub mod access;
pub mod adapter;
pub mod admin;
pub mod config;
pub mod error;
pub mod extension;
pub mod identity;
pub mod index;
pub mod jobs;
pub mod logging;
pub mod service;

pub use adapter::{Adapter, Designator, Session, Wildmat};
pub use config::{Config, create_default_config, load_config};
pub use error::GatewayError;
pub use index::{Article, Group, IndexStore, MemoryStore, RecordId};
pub use service::ServiceManager;
