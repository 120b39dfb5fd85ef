//! IRC channel modes.

mod parse;

pub use self::parse::{parse_channel_modes, takes_arg, ModeChange};
