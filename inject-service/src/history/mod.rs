pub mod ledger;
pub mod rollback;

pub use ledger::{push_bounded, HistoryLedger};
pub use rollback::{RollbackEngine, RollbackOutcome};
