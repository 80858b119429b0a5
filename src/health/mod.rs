pub mod checkers;
pub mod composite;

pub use composite::{CheckResult, CheckStatus, Checker, HealthComposite, HealthReport};
