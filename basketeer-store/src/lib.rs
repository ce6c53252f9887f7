// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # basketeer Store
//!
//! Persistence for the `basketeer` client.
//!
//! - **Settings**: user preferences loaded from the config directory
//! - **Profiles**: credential stores (JSON file or system keychain)
//!   implementing [`basketeer_core::ProfileStore`]
//! - **Persistence**: owner-only JSON file helpers

pub mod error;
pub mod persistence;
pub mod profile;
pub mod settings;

pub use error::StoreError;
pub use persistence::{
    default_config_dir, default_profile_path, default_settings_path, load_json,
    load_json_or_default, save_json,
};
pub use profile::{
    FileProfileStore, KeychainProfileStore, describe_backend, open_profile_store,
};
pub use settings::{CredentialBackend, Settings};
