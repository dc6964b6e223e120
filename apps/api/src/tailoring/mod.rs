//! Résumé tailoring core.
//!
//! Turns an arbitrage result into a reviewable, reversible adaptation:
//! - `schema`: coerce loose model JSON into `ResumeDocument`
//! - `decisions`: normalize the decision report
//! - `matcher` / `reconcile`: map clean experiences onto the adapted copy and
//!   apply accept/reject toggles
//! - `ledger`: per-session cost accounting
//! - `session` / `store`: session state and the in-memory registry

pub mod decisions;
pub mod diff;
pub mod handlers;
pub mod ledger;
pub mod matcher;
pub mod narrative;
pub mod reconcile;
pub mod schema;
pub mod session;
pub mod store;
