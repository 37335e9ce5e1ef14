//! ISUPPORT (RPL_ISUPPORT, numeric 005) parameter parsing.
//!
//! Servers advertise their limits and semantics as `NAME` or `NAME=VALUE`
//! tokens. The registry maps a known name to a strict validator producing
//! a typed [`IsupportParam`]; malformed values are reported as defects and
//! degrade to the raw form so one bad token never halts negotiation.
//!
//! # Reference
//! - <https://modern.ircdocs.horse/#rplisupport-005>

use crate::casemap::CaseMapping;
use crate::error::{IsupportDecodeError, ProtocolDefect};
use crate::registry::FactoryRegistry;

/// One `(mode letter, display prefix)` pair from the PREFIX parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ModePrefix {
    /// Channel membership mode letter (e.g. `o`).
    pub mode: char,
    /// Display character shown before nicks (e.g. `@`).
    pub display: char,
}

/// A decoded ISUPPORT parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum IsupportParam {
    /// `PREFIX=(modes)displays`, zero-indexed pairing.
    Prefix(Vec<ModePrefix>),
    /// `CHANTYPES=#&`: channel name prefix characters.
    ChanTypes(Vec<char>),
    /// `CHANLIMIT=#:10,&:5`: join limit per channel-type prefix.
    ChanLimit(Vec<(char, u32)>),
    /// `CHANMODES=b,k,l,imnt`: the four channel-mode categories.
    ChanModes {
        /// Type A: list modes.
        list: String,
        /// Type B: always take a parameter.
        always_param: String,
        /// Type C: parameter when set only.
        set_param: String,
        /// Type D: never take a parameter.
        flag: String,
    },
    /// `CASEMAPPING=rfc1459`.
    CaseMapping(CaseMapping),
    /// `NETWORK=ExampleNet`.
    Network(String),
    /// `NICKLEN=31`.
    NickLen(u32),
    /// `CHANNELLEN=50`.
    ChannelLen(u32),
    /// `TOPICLEN=390`.
    TopicLen(u32),
    /// `KICKLEN=255`.
    KickLen(u32),
    /// `AWAYLEN=200`.
    AwayLen(u32),
    /// `MODES=4`: mode changes per MODE command.
    Modes(u32),
    /// `MAXLIST=beI:25`: list-mode entry limits keyed by mode letter.
    MaxList(Vec<(char, u32)>),
    /// `STATUSMSG=@+`: prefixes addressable in PRIVMSG targets.
    StatusMsg(Vec<char>),
    /// `EXCEPTS[=e]`: ban exception mode letter.
    Excepts(char),
    /// `INVEX[=I]`: invite exception mode letter.
    Invex(char),
    /// `TARGMAX=PRIVMSG:4,NOTICE:3,JOIN:`: target limits per command.
    TargMax(Vec<(String, Option<u32>)>),
    /// Unregistered or undecodable parameter, kept verbatim.
    Raw {
        /// Parameter name as transmitted.
        name: String,
        /// Raw value, if one was transmitted.
        value: Option<String>,
    },
}

impl IsupportParam {
    /// The parameter name this value was decoded from.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Prefix(_) => "PREFIX",
            Self::ChanTypes(_) => "CHANTYPES",
            Self::ChanLimit(_) => "CHANLIMIT",
            Self::ChanModes { .. } => "CHANMODES",
            Self::CaseMapping(_) => "CASEMAPPING",
            Self::Network(_) => "NETWORK",
            Self::NickLen(_) => "NICKLEN",
            Self::ChannelLen(_) => "CHANNELLEN",
            Self::TopicLen(_) => "TOPICLEN",
            Self::KickLen(_) => "KICKLEN",
            Self::AwayLen(_) => "AWAYLEN",
            Self::Modes(_) => "MODES",
            Self::MaxList(_) => "MAXLIST",
            Self::StatusMsg(_) => "STATUSMSG",
            Self::Excepts(_) => "EXCEPTS",
            Self::Invex(_) => "INVEX",
            Self::TargMax(_) => "TARGMAX",
            Self::Raw { name, .. } => name,
        }
    }
}

/// Registry of ISUPPORT validators with raw-parameter fallback.
#[derive(Debug)]
pub struct IsupportRegistry {
    factories: FactoryRegistry<IsupportParam, IsupportDecodeError>,
}

impl IsupportRegistry {
    /// Create a registry with no validators; every token comes out raw.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            factories: FactoryRegistry::new(),
        }
    }

    /// Create a registry with validators for the standard parameters.
    #[must_use]
    pub fn new() -> Self {
        let registry = Self::empty();
        registry.register("PREFIX", decode_prefix);
        registry.register("CHANTYPES", decode_chantypes);
        registry.register("CHANLIMIT", decode_chanlimit);
        registry.register("CHANMODES", decode_chanmodes);
        registry.register("CASEMAPPING", decode_casemapping);
        registry.register("NETWORK", decode_network);
        registry.register("NICKLEN", |n, v| decode_u32(n, v).map(IsupportParam::NickLen));
        registry.register("CHANNELLEN", |n, v| {
            decode_u32(n, v).map(IsupportParam::ChannelLen)
        });
        registry.register("TOPICLEN", |n, v| decode_u32(n, v).map(IsupportParam::TopicLen));
        registry.register("KICKLEN", |n, v| decode_u32(n, v).map(IsupportParam::KickLen));
        registry.register("AWAYLEN", |n, v| decode_u32(n, v).map(IsupportParam::AwayLen));
        registry.register("MODES", |n, v| decode_u32(n, v).map(IsupportParam::Modes));
        registry.register("MAXLIST", decode_maxlist);
        registry.register("STATUSMSG", decode_statusmsg);
        registry.register("EXCEPTS", |n, v| {
            decode_mode_letter(n, v, 'e').map(IsupportParam::Excepts)
        });
        registry.register("INVEX", |n, v| {
            decode_mode_letter(n, v, 'I').map(IsupportParam::Invex)
        });
        registry.register("TARGMAX", decode_targmax);
        registry
    }

    /// Register a validator under a parameter name, replacing any previous
    /// one. Supports server-specific, non-standard tokens.
    pub fn register<F>(&self, name: impl Into<String>, validator: F)
    where
        F: Fn(&str, Option<&str>) -> Result<IsupportParam, IsupportDecodeError>
            + Send
            + Sync
            + 'static,
    {
        self.factories.register(name, validator);
    }

    /// Remove the validator for a parameter name. Returns whether one was
    /// present.
    pub fn unregister(&self, name: &str) -> bool {
        self.factories.unregister(name)
    }

    /// Whether a validator is registered for `name`.
    #[must_use]
    pub fn is_registered(&self, name: &str) -> bool {
        self.factories.is_registered(name)
    }

    /// Decode one `NAME` or `NAME=VALUE` token.
    ///
    /// Validator failures push a defect carrying the whole token and
    /// degrade to [`IsupportParam::Raw`]; this never fails.
    pub fn create_parameter(&self, token: &str, defects: &mut Vec<ProtocolDefect>) -> IsupportParam {
        let (name, value) = match token.split_once('=') {
            // A trailing bare `=` carries no value.
            Some((n, "")) => (n, None),
            Some((n, v)) => (n, Some(v)),
            None => (token, None),
        };

        match self.factories.create(name, value) {
            None => IsupportParam::Raw {
                name: name.to_string(),
                value: value.map(str::to_string),
            },
            Some(Ok(param)) => param,
            Some(Err(cause)) => {
                tracing::debug!(%token, %cause, "ISUPPORT decode failed, keeping raw");
                defects.push(ProtocolDefect::Isupport {
                    token: token.to_string(),
                    cause,
                });
                IsupportParam::Raw {
                    name: name.to_string(),
                    value: value.map(str::to_string),
                }
            }
        }
    }
}

impl Default for IsupportRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn require_value<'a>(name: &str, raw: Option<&'a str>) -> Result<&'a str, IsupportDecodeError> {
    raw.ok_or_else(|| IsupportDecodeError::MissingValue {
        name: name.to_string(),
    })
}

fn decode_u32(name: &str, raw: Option<&str>) -> Result<u32, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    value
        .parse()
        .map_err(|_| IsupportDecodeError::InvalidInteger {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn decode_prefix(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    let bad_shape = || IsupportDecodeError::BadShape {
        name: name.to_string(),
        value: value.to_string(),
    };

    let rest = value.strip_prefix('(').ok_or_else(bad_shape)?;
    let (modes, displays) = rest.split_once(')').ok_or_else(bad_shape)?;

    let modes: Vec<char> = modes.chars().collect();
    let displays: Vec<char> = displays.chars().collect();
    if modes.len() != displays.len() {
        return Err(IsupportDecodeError::PrefixLengthMismatch {
            value: value.to_string(),
        });
    }

    Ok(IsupportParam::Prefix(
        modes
            .into_iter()
            .zip(displays)
            .map(|(mode, display)| ModePrefix { mode, display })
            .collect(),
    ))
}

fn decode_chantypes(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    Ok(IsupportParam::ChanTypes(value.chars().collect()))
}

fn decode_chanlimit(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    let mut limits = Vec::new();
    for group in value.split(',') {
        let (prefixes, limit) =
            group
                .split_once(':')
                .ok_or_else(|| IsupportDecodeError::BadShape {
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
        let limit: u32 = limit
            .parse()
            .map_err(|_| IsupportDecodeError::InvalidInteger {
                name: name.to_string(),
                value: limit.to_string(),
            })?;
        for prefix in prefixes.chars() {
            limits.push((prefix, limit));
        }
    }
    Ok(IsupportParam::ChanLimit(limits))
}

fn decode_chanmodes(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    let mut groups = value.splitn(4, ',');
    match (groups.next(), groups.next(), groups.next(), groups.next()) {
        (Some(a), Some(b), Some(c), Some(d)) => Ok(IsupportParam::ChanModes {
            list: a.to_string(),
            always_param: b.to_string(),
            set_param: c.to_string(),
            flag: d.to_string(),
        }),
        _ => Err(IsupportDecodeError::BadShape {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}

fn decode_casemapping(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    CaseMapping::from_isupport(value)
        .map(IsupportParam::CaseMapping)
        .ok_or_else(|| IsupportDecodeError::BadShape {
            name: name.to_string(),
            value: value.to_string(),
        })
}

fn decode_network(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    require_value(name, raw).map(|v| IsupportParam::Network(v.to_string()))
}

fn decode_maxlist(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    let mut limits = Vec::new();
    for group in value.split(',') {
        let (modes, limit) =
            group
                .split_once(':')
                .ok_or_else(|| IsupportDecodeError::BadShape {
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
        let limit: u32 = limit
            .parse()
            .map_err(|_| IsupportDecodeError::InvalidInteger {
                name: name.to_string(),
                value: limit.to_string(),
            })?;
        for mode in modes.chars() {
            limits.push((mode, limit));
        }
    }
    Ok(IsupportParam::MaxList(limits))
}

fn decode_statusmsg(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    require_value(name, raw).map(|v| IsupportParam::StatusMsg(v.chars().collect()))
}

fn decode_mode_letter(
    name: &str,
    raw: Option<&str>,
    default: char,
) -> Result<char, IsupportDecodeError> {
    match raw {
        None => Ok(default),
        Some(value) => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(IsupportDecodeError::BadShape {
                    name: name.to_string(),
                    value: value.to_string(),
                }),
            }
        }
    }
}

fn decode_targmax(name: &str, raw: Option<&str>) -> Result<IsupportParam, IsupportDecodeError> {
    let value = require_value(name, raw)?;
    let mut entries = Vec::new();
    for group in value.split(',').filter(|g| !g.is_empty()) {
        let (command, limit) =
            group
                .split_once(':')
                .ok_or_else(|| IsupportDecodeError::BadShape {
                    name: name.to_string(),
                    value: value.to_string(),
                })?;
        let limit = if limit.is_empty() {
            None
        } else {
            Some(
                limit
                    .parse()
                    .map_err(|_| IsupportDecodeError::InvalidInteger {
                        name: name.to_string(),
                        value: limit.to_string(),
                    })?,
            )
        };
        entries.push((command.to_string(), limit));
    }
    Ok(IsupportParam::TargMax(entries))
}
