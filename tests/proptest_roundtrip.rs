//! Property-based round-trip tests for the message grammar.

use proptest::prelude::*;

use slirc_engine::message::tags::{escape_tag_value, unescape_tag_value};
use slirc_engine::{CommandToken, Mask, RawMessage};

/// A middle parameter: no spaces, no leading colon, nonempty.
fn middle_param() -> impl Strategy<Value = String> {
    "[A-Za-z0-9#&+\\-]{1,12}"
}

/// A trailing parameter: printable ASCII, spaces and colons allowed.
fn trailing_param() -> impl Strategy<Value = String> {
    "[ -~]{0,30}"
}

/// An alphabetic command word.
fn command_word() -> impl Strategy<Value = String> {
    "[A-Za-z]{1,10}"
}

proptest! {
    /// Parsing then re-joining all parameters with single spaces and
    /// re-prefixing the last with `:` reproduces the parameter section.
    #[test]
    fn trailing_param_section_round_trips(
        command in command_word(),
        middles in prop::collection::vec(middle_param(), 0..4),
        trailing in trailing_param(),
    ) {
        let mut section = middles.join(" ");
        if !section.is_empty() {
            section.push(' ');
        }
        section.push(':');
        section.push_str(&trailing);

        let line = format!("{command} {section}");
        let message = RawMessage::parse(&line).unwrap();

        let mut expected = middles.clone();
        expected.push(trailing.clone());
        prop_assert_eq!(&message.params, &expected);

        let (last, heads) = message.params.split_last().unwrap();
        let mut rebuilt = heads.join(" ");
        if !rebuilt.is_empty() {
            rebuilt.push(' ');
        }
        rebuilt.push(':');
        rebuilt.push_str(last);
        prop_assert_eq!(rebuilt, section);
    }

    /// Display then parse is identity on the structured form.
    #[test]
    fn display_round_trips(
        command in command_word(),
        middles in prop::collection::vec(middle_param(), 0..4),
        trailing in trailing_param(),
    ) {
        let mut line = command;
        for middle in &middles {
            line.push(' ');
            line.push_str(middle);
        }
        line.push_str(" :");
        line.push_str(&trailing);

        let message = RawMessage::parse(&line).unwrap();
        let reparsed = RawMessage::parse(&message.to_string()).unwrap();
        prop_assert_eq!(message.params, reparsed.params);
        prop_assert_eq!(message.command, reparsed.command);
    }

    /// Three ASCII digits are a numeric command; alphabetic runs are
    /// words; the parser never accepts anything else.
    #[test]
    fn command_classification(token in "[A-Za-z0-9]{1,6}") {
        let result = RawMessage::parse(&token);
        let is_numeric = token.len() == 3 && token.bytes().all(|b| b.is_ascii_digit());
        let is_word = token.bytes().all(|b| b.is_ascii_alphabetic());
        match result {
            Ok(message) => {
                prop_assert!(is_numeric || is_word);
                if is_numeric {
                    prop_assert!(matches!(message.command, CommandToken::Numeric(_)));
                } else {
                    prop_assert!(matches!(message.command, CommandToken::Word(_)));
                }
            }
            Err(_) => prop_assert!(!is_numeric && !is_word),
        }
    }

    /// Tag escaping round-trips for arbitrary values.
    #[test]
    fn tag_escaping_round_trips(value in "[ -~\r\n]{0,40}") {
        let escaped = escape_tag_value(&value);
        prop_assert!(!escaped.contains(' '));
        prop_assert!(!escaped.contains(';'));
        prop_assert_eq!(unescape_tag_value(&escaped), value);
    }

    /// The parser never panics, whatever arrives on the wire.
    #[test]
    fn parser_never_panics(line in "[ -~]{0,80}") {
        let _ = RawMessage::parse(&line);
    }

    /// Mask combinators obey boolean algebra for arbitrary identities.
    #[test]
    fn mask_boolean_laws(
        nick in "[A-Za-z][A-Za-z0-9]{0,8}",
        user in "[A-Za-z0-9~]{1,8}",
        host in "[a-z0-9.]{1,12}",
        mask_host in "[a-z0-9.]{1,12}",
        mask_nick in "[A-Za-z][A-Za-z0-9]{0,8}",
    ) {
        let identity = format!("{nick}!{user}@{host}");
        let m1 = Mask::host(mask_host);
        let m2 = Mask::nick(mask_nick);

        prop_assert_eq!(
            m1.clone().and(m2.clone()).test_str(&identity),
            m1.test_str(&identity) && m2.test_str(&identity)
        );
        prop_assert_eq!(
            m1.clone().or(m2.clone()).test_str(&identity),
            m1.test_str(&identity) || m2.test_str(&identity)
        );
        prop_assert_eq!(m1.clone().negate().test_str(&identity), !m1.test_str(&identity));
    }
}
