pub mod ledger;

pub use ledger::ResponseLedger;
