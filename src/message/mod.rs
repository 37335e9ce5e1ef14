//! IRC message types and parsing.

mod nom_parser;
pub mod tags;
mod types;

pub use self::nom_parser::ParsedMessage;
pub use self::tags::Tag;
pub use self::types::{CommandToken, RawMessage};
