mod change;
mod ledger;
mod report;
mod tier;

pub use change::{ChangeAction, ChangeKind, ChangeRecord};
pub use ledger::ChangeLedger;
pub use report::RunReport;
pub use tier::Tier;
