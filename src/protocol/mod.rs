//! Simulator-side DenIM wire protocol.
//!
//! Everything an agent exchanges with its client process is ASCII lines
//! terminated by `\n`.
//!
//! ## Outgoing command grammar
//!
//! | Command                    | Effect                                   |
//! |----------------------------|------------------------------------------|
//! | `send:<nickname>:<text>`   | Deliver a regular message                |
//! | `denim:<nickname>:<text>`  | Deliver a deniable message               |
//! | `read`                     | Print buffered incoming messages         |
//!
//! ## Incoming line grammar
//!
//! ```text
//! <prefix><sender>:<body>[:<metadata>...]
//! ```
//!
//! The first colon-delimited field must be at least 8 characters; a
//! case-insensitive `deniable` substring in it marks the message deniable.
//! Lines that do not match are discarded silently: client output mixes
//! delivered messages with prompts and status noise, and dropping the
//! noise is the contract, not an error path.
//!
//! Note the asymmetry: outgoing commands carry the destination, incoming
//! lines carry the sender. A parsed incoming message therefore has an
//! empty `to` field.

mod codec;
mod message;

pub use codec::{
    encode_command, format_incoming, parse_incoming, DENIABLE_KEYWORD, DENIABLE_PREFIX,
    MIN_SENDER_FIELD_LEN, READ_COMMAND, REGULAR_PREFIX, SEND_KEYWORD,
};
pub use message::{BehaviorParams, EventType, Message, MessageEvent, UNKNOWN_SENDER};
