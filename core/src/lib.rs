//! Deterministic policy evaluation and a hash-chained, ed25519-signed
//! receipt ledger for agent/automation decisions.

pub mod canon;
pub mod clock;
pub mod config;
pub mod error;
pub mod keyring;
pub mod ledger;
pub mod model;
pub mod policy;
pub mod receipt;
pub mod replay;

pub use config::{Config, Core};
pub use error::{Error, Result};
pub use model::Receipt;
