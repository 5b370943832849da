pub mod giveaway;
pub mod participant;
pub mod stats;
pub mod tournament;
pub mod user;
pub mod winner;

pub use giveaway::*;
pub use participant::*;
pub use stats::*;
pub use tournament::*;
pub use user::*;
pub use winner::*;
