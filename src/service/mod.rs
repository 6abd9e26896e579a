//! Services: key lifecycle and the owner-scoped vault façade.

pub mod key_service;
pub mod vault_service;

pub use key_service::KeyService;
pub use vault_service::VaultService;
