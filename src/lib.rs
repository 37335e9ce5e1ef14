//! # slirc-engine
//!
//! A client-side IRC protocol engine: the piece between a transport that
//! delivers lines and an application that wants structured events.
//!
//! ## Features
//!
//! - IRC message parsing with tags, prefixes, commands, and parameters
//! - IRCv3 capability negotiation (CAP LS/ACK/NAK/NEW/DEL/LIST) as a
//!   sans-IO state machine with a pluggable handler chain
//! - ISUPPORT (RPL_ISUPPORT) parsing with strict per-parameter validators
//! - Open tag and ISUPPORT registries with graceful raw fallback
//! - Actor resolution and identity tracking with immutable snapshots
//! - Composable nick/user/host masks
//!
//! Everything degrades rather than fails: malformed tags, ISUPPORT
//! tokens, and CAP lines are reported as [`ProtocolDefect`]s and the
//! connection keeps going.
//!
//! ## Quick Start
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use slirc_engine::RawMessage;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message = RawMessage::parse(raw).expect("valid IRC line");
//!
//! assert_eq!(message.command.to_string(), "PRIVMSG");
//! assert_eq!(message.param(1), Some("Hello!"));
//! assert_eq!(message.tags.len(), 1);
//! ```
//!
//! ### Driving a Connection
//!
//! ```rust
//! use slirc_engine::{Engine, EngineAction, RequestCaps};
//!
//! let mut engine = Engine::new();
//! engine.add_cap_handler(Box::new(RequestCaps::new(["server-time"])));
//!
//! // Send the opening CAP LS, then feed every received line back in.
//! for action in engine.begin_negotiation() {
//!     if let EngineAction::Send(line) = action {
//!         assert_eq!(line, "CAP LS 302");
//!     }
//! }
//!
//! let dispatch = engine.feed_line(":irc.example CAP * LS :server-time sasl");
//! assert!(dispatch
//!     .actions
//!     .contains(&EngineAction::Send("CAP REQ :server-time".to_string())));
//! ```
//!
//! ## Acknowledgments
//!
//! This project was inspired by the architectural patterns established by
//! [Aaron Weiss (aatxe)](https://github.com/aatxe) in the
//! [irc](https://github.com/aatxe/irc) crate. We are grateful for Aaron's
//! foundational work on IRC protocol handling in Rust.

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod actor;
pub mod caps;
pub mod casemap;
pub mod engine;
pub mod error;
pub mod isupport;
pub mod mask;
pub mod message;
pub mod registry;
pub mod tag;

pub use self::actor::{Actor, ActorTracker, ChannelRoster, UserSnapshot};
pub use self::caps::{
    CapAction, CapEntry, CapHandler, CapNegotiator, Capability, NegotiationOutcome, RequestCaps,
};
pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::engine::{DecodedMessage, Dispatch, Engine, EngineAction, ServerInfo};
pub use self::error::{
    CapProtocolError, IsupportDecodeError, MessageParseError, ProtocolDefect, TagDecodeError,
};
pub use self::isupport::{IsupportParam, IsupportRegistry, ModePrefix};
pub use self::mask::Mask;
pub use self::message::{CommandToken, RawMessage, Tag};
pub use self::registry::FactoryRegistry;
pub use self::tag::{TagRegistry, TypedTag, TypingState};
