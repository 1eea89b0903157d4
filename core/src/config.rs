//! Process-wide configuration and the shared `Core` handle. Grounded on
//! the teacher's `keychain.rs` env-var override pattern
//! (`INTELEXTA_KEYCHAIN_DIR`) for reading paths from the environment, and
//! on its `DbPool` (`r2d2::Pool`) as the analogous "one shared handle
//! built once at startup, passed by reference into every operation"
//! shape — substituted here with a pair of `Mutex`-guarded file handles
//! since there is no database in this system.

use std::path::PathBuf;

use crate::clock::{Clock, SystemClock};
use crate::keyring::Keyring;
use crate::ledger::Ledger;
use crate::model::PolicyRuleSet;

pub const DEFAULT_LOG_PATH: &str = "pat_log.jsonl";
pub const DEFAULT_KEYRING_PATH: &str = "pat_keys.json";

/// File locations for the ledger and keyring, read from `LOG_PATH` /
/// `KEYRING_PATH` if set, falling back to the spec's defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_path: PathBuf,
    pub keyring_path: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Config {
            log_path: std::env::var("LOG_PATH").unwrap_or_else(|_| DEFAULT_LOG_PATH.into()).into(),
            keyring_path: std::env::var("KEYRING_PATH").unwrap_or_else(|_| DEFAULT_KEYRING_PATH.into()).into(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_path: DEFAULT_LOG_PATH.into(),
            keyring_path: DEFAULT_KEYRING_PATH.into(),
        }
    }
}

/// The one shared handle a running process builds at startup: the
/// ledger, the keyring, the policy ruleset in force, and the clock. Each
/// CLI invocation constructs exactly one `Core` and passes it by
/// reference into every operation, so `LedgerLock`/`KeyringLock` are held
/// for the shortest span each operation actually needs.
pub struct Core {
    pub ledger: Ledger,
    pub keyring: Keyring,
    pub policy: PolicyRuleSet,
    pub clock: Box<dyn Clock>,
}

impl Core {
    pub fn new(config: &Config, policy: PolicyRuleSet) -> Self {
        Core {
            ledger: Ledger::new(&config.log_path),
            keyring: Keyring::new(&config.keyring_path),
            policy,
            clock: Box::new(SystemClock),
        }
    }

    pub fn with_clock(config: &Config, policy: PolicyRuleSet, clock: Box<dyn Clock>) -> Self {
        Core {
            ledger: Ledger::new(&config.log_path),
            keyring: Keyring::new(&config.keyring_path),
            policy,
            clock,
        }
    }
}

/// `PAT_DEMO_001` / `0.2.0`, the default ruleset from the original
/// source's `config.py::DEFAULT_POLICY`.
pub fn default_policy() -> PolicyRuleSet {
    PolicyRuleSet {
        policy_id: "PAT_DEMO_001".into(),
        version: "0.2.0".into(),
        high_stakes_actions: vec![
            "DISPATCH_POLICE".into(),
            "ESCALATE_INCIDENT".into(),
            "LOCKDOWN".into(),
        ],
        confidence_threshold: 0.85,
    }
}
