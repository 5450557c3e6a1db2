pub mod bus;
pub mod types;

pub use bus::{CommandBus, CommandSender};
pub use types::{Command, ParseError, USAGE};
