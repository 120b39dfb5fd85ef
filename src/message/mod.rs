mod builders;
mod nom_parser;
mod parse;
mod serialize;
pub mod tags;
mod types;

pub use self::types::{Message, Tag};
