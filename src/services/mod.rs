pub mod draw;
pub mod health;
pub mod ledger;
pub mod membership;
pub mod notify;
pub mod supervisor;
pub mod telegram;
