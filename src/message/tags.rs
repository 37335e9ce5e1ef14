//! IRCv3 message tags: wire escaping and the raw tag pair.

/// One message tag as transmitted: a name and an optional raw value.
///
/// Names are case-sensitive. An absent value (`key`) is distinct from an
/// empty one (`key=`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Tag {
    /// Tag name as transmitted.
    pub name: String,
    /// Unescaped tag value, if one was transmitted.
    pub value: Option<String>,
}

impl Tag {
    /// Create a tag from a name and optional unescaped value.
    pub fn new(name: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            value: value.map(Into::into),
        }
    }
}

/// Split a raw tag section (without the leading `@`) into tags.
///
/// Each `;`-separated token splits on the first `=` into name and value;
/// values are unescaped per the IRCv3 message-tags rule.
pub fn parse_tag_section(section: &str) -> Vec<Tag> {
    section
        .split(';')
        .filter(|t| !t.is_empty())
        .map(|token| match token.split_once('=') {
            Some((name, raw)) => Tag {
                name: name.to_string(),
                value: Some(unescape_tag_value(raw)),
            },
            None => Tag {
                name: token.to_string(),
                value: None,
            },
        })
        .collect()
}

/// Escape a tag value for serialization.
///
/// Escapes special characters according to the IRCv3 message-tags spec.
pub fn escape_tag_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            ';' => escaped.push_str("\\:"),
            ' ' => escaped.push_str("\\s"),
            '\\' => escaped.push_str("\\\\"),
            '\r' => escaped.push_str("\\r"),
            '\n' => escaped.push_str("\\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Unescape a tag value from wire format.
///
/// Reverses the escaping applied by [`escape_tag_value`]. A dangling
/// trailing backslash is dropped; an unknown escape drops the backslash.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}
