pub mod ledger;
pub mod user;

pub use ledger::{BonusClaim, SessionLogEntry, SoldDataEntry};
pub use user::User;
