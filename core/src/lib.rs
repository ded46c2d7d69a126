//! Core library for the recetario recipe browser.
//!
//! The interesting part is [`FavoritesStore`], which keeps a local view of
//! favorited recipes consistent with a push-notified remote table. The
//! remaining modules are the collaborators it is wired to: the table
//! backends, the record codec and the recipe catalog client.

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod storage;

pub use catalog::CatalogClient;
pub use config::{load_config, BackendConfig, Config};
pub use error::{Error, Result};
pub use favorites::{Diagnostic, FavoritesStore, FavoritesUpdate, StoreOptions, SubscriptionHandle};
