//! An injectable UTC wall-clock source (spec.md §9: "the `ts_utc` field
//! participates in canonical hashing... the time source should be
//! injectable" for deterministic tests). Grounded on the teacher's use of
//! `chrono::{DateTime, Utc}` for every stored timestamp (`car.rs`,
//! `orchestrator.rs`).

use chrono::{DateTime, SubsecRound, Utc};

/// Seconds-precision RFC3339 UTC, `Z`-suffixed, matching spec.md §3
/// (`ts_utc: string — RFC3339 UTC, seconds precision, Z suffix`).
pub trait Clock: Send + Sync {
    fn now_utc(&self) -> DateTime<Utc>;

    fn now_rfc3339(&self) -> String {
        self.now_utc()
            .trunc_subsecs(0)
            .to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
    }
}

/// The real wall clock. Must not be swapped for a monotonic clock (spec.md
/// §9): `ts_utc` is hashed, so it has to mean wall-clock UTC, not elapsed
/// time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formats_seconds_precision_with_z_suffix() {
        let fixed = FixedClock(Utc.with_ymd_and_hms(2026, 7, 28, 12, 30, 5).unwrap());
        assert_eq!(fixed.now_rfc3339(), "2026-07-28T12:30:05Z");
    }
}
