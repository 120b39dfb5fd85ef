//! # slirc-client
//!
//! A blocking IRC client library.
//!
//! ## Features
//!
//! - IRC message parsing and serialization with tags, sources and parameters
//! - Non-blocking TCP transport with optional TLS (rustls)
//! - Registration with automatic nick-collision handling and PING replies
//! - Blocking join / part / nick / WHO / WHOIS / ISON that wait for the
//!   server's answer, with timeouts
//! - A live channel roster: members, privileges, topic and modes
//! - Typed events dispatched to per-kind handlers
//! - ISUPPORT (RPL_ISUPPORT) tracking and IRC case-mapping

#![deny(clippy::all)]
// TODO: Enable once documentation coverage is complete
// #![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ### Creating IRC Messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let privmsg = Message::privmsg("#rust", "Hello, world!");
//! assert_eq!(privmsg.to_line(), "PRIVMSG #rust :Hello, world!\r\n");
//!
//! let join = Message::join("#channel", Some("secret"));
//! assert_eq!(join.to_string(), "JOIN #channel secret\r\n");
//! ```
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let raw = "@time=2023-01-01T12:00:00Z :nick!user@host PRIVMSG #channel :Hello!";
//! let message: Message = raw.parse().expect("Valid IRC message");
//!
//! assert_eq!(message.tag("time"), Some(Some("2023-01-01T12:00:00Z")));
//! assert_eq!(message.source_nick(), Some("nick"));
//! assert_eq!(message.params, vec!["#channel", "Hello!"]);
//! ```
//!
//! ### Running a Client
//!
//! See [`Client`] for a connected example.

pub mod casemap;
pub mod client;
pub mod error;
pub mod event;
pub mod isupport;
pub mod message;
pub mod mode;
pub mod roster;
pub mod source;
pub mod state;
pub mod transport;
pub mod util;

pub use self::casemap::{irc_eq, irc_to_lower, CaseMapping};
pub use self::client::{Client, ClientConfig};
pub use self::error::{ClientError, MessageParseError, Result, TransportError};
pub use self::event::{Event, EventKind, HandlerId};
pub use self::isupport::{Isupport, PrefixSpec};
pub use self::message::{Message, Tag};
pub use self::mode::ModeChange;
pub use self::roster::{Channel, ChannelMode, ModeValue, Privilege, WhoResult, WhoisResult};
pub use self::source::Source;
pub use self::state::ConnectionState;
pub use self::transport::{TcpTransport, Transport, VerifyMode, MAX_IRC_LINE_LEN};
