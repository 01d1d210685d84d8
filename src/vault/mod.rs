//! # Secret Store Access
//!
//! The [`SecretStore`] capability, its reqwest implementation, lazy listing
//! and the narrow classification of remote conflict responses.

pub mod classify;
pub mod factory;
pub mod http;
pub mod listing;
pub mod store;

pub use classify::{conflict_signature, is_cas_mismatch, is_path_in_use, RemoteConflict};
pub use factory::{StoreFactory, VaultClientFactory};
pub use http::VaultClient;
pub use listing::{list_secrets, SecretEntryStream};
pub use store::{
    AuthRole, JwtTrust, PageRequest, SecretEntry, SecretMetadataRecord, SecretPage, SecretStore,
    StoredSecret,
};
