//! Plain-data model of what the server has told us about channels and users.

mod channel;
mod who;

pub use self::channel::{parse_names_entry, Channel, ChannelMode, ModeValue, Privilege};
pub use self::who::{WhoResult, WhoisResult};
