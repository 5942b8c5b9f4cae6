//! SQLite persistence and on-disk configuration for the twin finder.

pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use config::{ChannelIds, Channels, DATA_DIR_ENV, Role, TwinConfig, default_data_dir};
pub use error::{Result, StoreError};
pub use store::{ArchivedToken, DATABASE_FILE, Store};
