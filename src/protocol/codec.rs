//! Wire encoding and parsing for the client command protocol.
//!
//! Outgoing commands are ASCII lines the client executes verbatim; incoming
//! lines are whatever the client prints for messages it delivered. Parsing
//! is deliberately forgiving: a line that does not match the grammar is
//! dropped, never surfaced as an error, because client output interleaves
//! messages with prompts and status noise.

use super::message::Message;

/// Command keyword for a regular message.
pub const SEND_KEYWORD: &str = "send";
/// Command keyword for a deniable message.
pub const DENIABLE_KEYWORD: &str = "denim";
/// Command instructing the client to print buffered incoming messages.
pub const READ_COMMAND: &str = "read";

/// Prefix the client prints before a regular sender nickname.
pub const REGULAR_PREFIX: &str = "Regular ";
/// Prefix the client prints before a deniable sender nickname.
pub const DENIABLE_PREFIX: &str = "Deniable ";

/// Minimum length of the first colon-delimited field of an incoming line.
/// Anything shorter cannot contain a prefix plus a sender and is noise.
pub const MIN_SENDER_FIELD_LEN: usize = 8;

/// Encode an outgoing message as a client command (no trailing newline).
///
/// Produces `send:<nickname>:<text>` or `denim:<nickname>:<text>`.
pub fn encode_command(msg: &Message) -> String {
    let keyword = if msg.is_deniable {
        DENIABLE_KEYWORD
    } else {
        SEND_KEYWORD
    };
    format!("{}:{}:{}", keyword, msg.to, msg.content)
}

/// Render a message the way the client prints it on delivery.
///
/// Used by tests and mock runtimes to produce well-formed incoming lines;
/// the inverse of [`parse_incoming`] for the fields that survive the wire
/// (sender, content, deniability; the destination is not encoded).
pub fn format_incoming(msg: &Message) -> String {
    let prefix = if msg.is_deniable {
        DENIABLE_PREFIX
    } else {
        REGULAR_PREFIX
    };
    format!("{}{}:{}", prefix, msg.from, msg.content)
}

/// Parse one line of client output into a message.
///
/// The grammar is `<prefix><sender>:<body>` where the first colon-delimited
/// field is at least [`MIN_SENDER_FIELD_LEN`] characters and a
/// case-insensitive `deniable` substring in it marks the message deniable.
/// The content is the second colon-delimited field. Returns `None` for
/// anything malformed.
pub fn parse_incoming(line: &str) -> Option<Message> {
    let line = line.trim_end_matches(['\n', '\r']);
    let (sender_field, rest) = line.split_once(':')?;

    if sender_field.len() < MIN_SENDER_FIELD_LEN {
        return None;
    }

    let is_deniable = sender_field.to_ascii_lowercase().contains("deniable");
    let prefix_len = if is_deniable {
        DENIABLE_PREFIX.len()
    } else {
        REGULAR_PREFIX.len()
    };

    let sender = sender_field.get(prefix_len..)?.trim();
    if sender.is_empty() {
        return None;
    }

    // Only the field up to the next colon is the body; clients append
    // delivery metadata after it.
    let content = rest.split(':').next().unwrap_or_default();

    Some(Message {
        to: String::new(),
        from: sender.to_string(),
        content: content.to_string(),
        is_deniable,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_regular_command() {
        let msg = Message::regular("bob", "alice", "hello there".to_string());
        assert_eq!(encode_command(&msg), "send:bob:hello there");
    }

    #[test]
    fn test_encode_deniable_command() {
        let msg = Message::deniable("bob", "alice", "hello there".to_string());
        assert_eq!(encode_command(&msg), "denim:bob:hello there");
    }

    #[test]
    fn test_parse_regular_line() {
        let msg = parse_incoming("Regular alice:hello bob").unwrap();
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.content, "hello bob");
        assert!(!msg.is_deniable);
        assert!(msg.to.is_empty());
    }

    #[test]
    fn test_parse_deniable_line() {
        let msg = parse_incoming("Deniable alice:psst").unwrap();
        assert_eq!(msg.from, "alice");
        assert_eq!(msg.content, "psst");
        assert!(msg.is_deniable);
    }

    #[test]
    fn test_parse_case_insensitive_deniable_marker() {
        let msg = parse_incoming("DENIABLE alice:psst").unwrap();
        assert!(msg.is_deniable);
    }

    #[test]
    fn test_parse_truncates_content_at_second_colon() {
        let msg = parse_incoming("Regular alice:hello:delivered 12:00").unwrap();
        assert_eq!(msg.content, "hello");
    }

    #[test]
    fn test_parse_discards_malformed_lines() {
        // No colon-delimited body.
        assert!(parse_incoming("Regular alice hello").is_none());
        // Sender field shorter than the minimum prefix length.
        assert!(parse_incoming("hi:there").is_none());
        // Prefix but no sender behind it.
        assert!(parse_incoming("Regular :hello").is_none());
        assert!(parse_incoming("Deniable :hello").is_none());
        // Empty line and bare delimiter.
        assert!(parse_incoming("").is_none());
        assert!(parse_incoming("\n").is_none());
    }

    #[test]
    fn test_roundtrip_both_kinds() {
        for original in [
            Message::regular("", "alice", "a perfectly normal day".to_string()),
            Message::deniable("", "alice", "meet at the usual place".to_string()),
        ] {
            let parsed = parse_incoming(&format_incoming(&original)).unwrap();
            assert_eq!(parsed.from, original.from);
            assert_eq!(parsed.content, original.content);
            assert_eq!(parsed.is_deniable, original.is_deniable);
        }
    }

    proptest! {
        /// Sender, content and deniability survive a format/parse cycle for
        /// arbitrary colon-free payloads. Senders containing the deniable
        /// marker are excluded; the wire format cannot distinguish them.
        #[test]
        fn prop_incoming_roundtrip(
            from in "[A-Za-z0-9_]{1,16}"
                .prop_filter("marker collision", |s| !s.to_ascii_lowercase().contains("deniable")),
            content in "[A-Za-z0-9 .,!?]{0,64}",
            deniable in any::<bool>(),
        ) {
            let msg = Message {
                to: String::new(),
                from: from.clone(),
                content: content.clone(),
                is_deniable: deniable,
            };
            let parsed = parse_incoming(&format_incoming(&msg)).unwrap();
            prop_assert_eq!(parsed.from, from);
            prop_assert_eq!(parsed.content, content);
            prop_assert_eq!(parsed.is_deniable, deniable);
        }
    }
}
