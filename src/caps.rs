//! IRCv3 capability negotiation.
//!
//! [`CapNegotiator`] is a sans-IO state machine in the same spirit as the
//! rest of this crate: it consumes parsed CAP lines and produces actions
//! (raw lines to send, defects to report) without performing any I/O, so
//! it works with any runtime and unit-tests without a socket.
//!
//! End-of-negotiation is an opt-out decision. After each LS/ACK/NAK event
//! the machine sends `CAP END` unless a handler registered further
//! requests or deferred the end; a deferring handler owns the obligation
//! to call [`CapNegotiator::finish`] eventually, otherwise connection
//! setup stalls. The machine does not detect that hazard.
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::mem;

use chrono::{DateTime, Utc};

use crate::error::{CapProtocolError, ProtocolDefect};
use crate::message::RawMessage;

/// Well-known IRCv3 capability names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Capability {
    /// Show all user prefix modes in NAMES.
    MultiPrefix,
    /// SASL authentication.
    Sasl,
    /// Notify of account login/logout.
    AccountNotify,
    /// Notify of away status changes.
    AwayNotify,
    /// Extended JOIN with account and realname.
    ExtendedJoin,
    /// Add account tag to messages.
    AccountTag,
    /// Message batching.
    Batch,
    /// Notify of capability changes (CAP NEW/DEL).
    CapNotify,
    /// Notify of hostname changes.
    ChgHost,
    /// Echo messages back to sender.
    EchoMessage,
    /// Notify of channel invites.
    InviteNotify,
    /// Server-time message tags.
    ServerTime,
    /// Full nick!user@host in NAMES.
    UserhostInNames,
    /// SETNAME command for changing realname.
    SetName,
    /// Client message tags support.
    MessageTags,
    /// Unique message IDs.
    Msgid,
    /// Label request/response correlation.
    LabeledResponse,
    /// Strict Transport Security.
    Sts,
    /// Unknown/custom capability.
    Custom(String),
}

impl AsRef<str> for Capability {
    fn as_ref(&self) -> &str {
        match self {
            Self::MultiPrefix => "multi-prefix",
            Self::Sasl => "sasl",
            Self::AccountNotify => "account-notify",
            Self::AwayNotify => "away-notify",
            Self::ExtendedJoin => "extended-join",
            Self::AccountTag => "account-tag",
            Self::Batch => "batch",
            Self::CapNotify => "cap-notify",
            Self::ChgHost => "chghost",
            Self::EchoMessage => "echo-message",
            Self::InviteNotify => "invite-notify",
            Self::ServerTime => "server-time",
            Self::UserhostInNames => "userhost-in-names",
            Self::SetName => "setname",
            Self::MessageTags => "message-tags",
            Self::Msgid => "msgid",
            Self::LabeledResponse => "labeled-response",
            Self::Sts => "sts",
            Self::Custom(s) => s,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl From<&str> for Capability {
    fn from(s: &str) -> Self {
        match s {
            "multi-prefix" => Self::MultiPrefix,
            "sasl" => Self::Sasl,
            "account-notify" => Self::AccountNotify,
            "away-notify" => Self::AwayNotify,
            "extended-join" => Self::ExtendedJoin,
            "account-tag" => Self::AccountTag,
            "batch" => Self::Batch,
            "cap-notify" => Self::CapNotify,
            "chghost" => Self::ChgHost,
            "echo-message" => Self::EchoMessage,
            "invite-notify" => Self::InviteNotify,
            "server-time" => Self::ServerTime,
            "userhost-in-names" => Self::UserhostInNames,
            "setname" => Self::SetName,
            "message-tags" => Self::MessageTags,
            "msgid" => Self::Msgid,
            "labeled-response" => Self::LabeledResponse,
            "sts" => Self::Sts,
            other => Self::Custom(other.to_string()),
        }
    }
}

/// One capability as currently known.
///
/// Entries are superseded wholesale on ACK/DEL, never mutated; the
/// enabled set is derivable by filtering out disabled entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapEntry {
    /// Capability name.
    pub name: String,
    /// Advertised value, if any (e.g. `sasl=PLAIN,EXTERNAL`).
    pub value: Option<String>,
    /// True only for capabilities removed via CAP DEL/NAK.
    pub disabled: bool,
    /// When this entry was created.
    pub since: DateTime<Utc>,
}

impl CapEntry {
    fn advertised(name: String, value: Option<String>) -> Self {
        Self {
            name,
            value,
            disabled: false,
            since: Utc::now(),
        }
    }
}

/// Accumulator threaded through the handler chain for one CAP event.
///
/// Handlers record further requests and may defer the end decision; the
/// machine acts on the combined outcome once, after all handlers ran.
#[derive(Debug, Default)]
pub struct NegotiationOutcome {
    requests: Vec<String>,
    defer_end: bool,
}

impl NegotiationOutcome {
    /// Ask the machine to REQ a capability before ending negotiation.
    pub fn request(&mut self, capability: impl AsRef<str>) {
        let name = capability.as_ref().to_string();
        if !self.requests.contains(&name) {
            self.requests.push(name);
        }
    }

    /// Keep negotiation open past this event.
    ///
    /// The deferring party must eventually call
    /// [`CapNegotiator::finish`] or issue further REQs.
    pub fn defer_end(&mut self) {
        self.defer_end = true;
    }

    /// Requests accumulated so far.
    #[must_use]
    pub fn requests(&self) -> &[String] {
        &self.requests
    }

    /// Whether some handler deferred the end decision.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        self.defer_end
    }
}

/// Observer of capability negotiation events.
///
/// All methods default to no-ops; implement the ones you care about.
/// Handlers run in registration order and see only fully merged LS/LIST
/// batches (multi-line responses are buffered first).
pub trait CapHandler: Send {
    /// Server advertised capabilities (initial LS, fully merged).
    fn on_ls(&mut self, _advertised: &[CapEntry], _out: &mut NegotiationOutcome) {}
    /// Server acknowledged requested capabilities.
    fn on_ack(&mut self, _acknowledged: &[CapEntry], _out: &mut NegotiationOutcome) {}
    /// Server rejected requested capabilities.
    fn on_nak(&mut self, _rejected: &[CapEntry], _out: &mut NegotiationOutcome) {}
    /// Server advertised additional capabilities after negotiation.
    fn on_new(&mut self, _added: &[CapEntry], _out: &mut NegotiationOutcome) {}
    /// Server revoked capabilities.
    fn on_del(&mut self, _removed: &[CapEntry], _out: &mut NegotiationOutcome) {}
    /// Server listed currently enabled capabilities (fully merged).
    fn on_list(&mut self, _enabled: &[CapEntry]) {}
}

/// Requests a fixed capability list out of whatever the server offers.
///
/// Covers the common case: REQ the intersection of wanted and advertised
/// on LS, and pick up wanted capabilities that appear later via CAP NEW.
#[derive(Debug, Clone, Default)]
pub struct RequestCaps {
    wanted: Vec<String>,
}

impl RequestCaps {
    /// Create a handler wanting the given capabilities.
    pub fn new<I, S>(wanted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            wanted: wanted.into_iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    fn request_available(&self, offered: &[CapEntry], out: &mut NegotiationOutcome) {
        for entry in offered {
            if self.wanted.iter().any(|w| w == &entry.name) {
                out.request(&entry.name);
            }
        }
    }
}

impl CapHandler for RequestCaps {
    fn on_ls(&mut self, advertised: &[CapEntry], out: &mut NegotiationOutcome) {
        self.request_available(advertised, out);
    }

    fn on_new(&mut self, added: &[CapEntry], out: &mut NegotiationOutcome) {
        self.request_available(added, out);
    }
}

/// Actions produced by the negotiation machine.
///
/// The caller owns the transport and sends [`CapAction::Send`] lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapAction {
    /// Send this raw line to the server.
    Send(String),
    /// A recoverable defect in a CAP line; its effect was dropped.
    Report(ProtocolDefect),
}

enum Answer {
    Ack,
    Nak,
    New,
    Del,
}

/// Sans-IO capability negotiation state machine.
pub struct CapNegotiator {
    negotiating: bool,
    outstanding: usize,
    ls_buffer: Vec<(String, Option<String>)>,
    list_buffer: Vec<(String, Option<String>)>,
    entries: HashMap<String, CapEntry>,
    enabled: HashSet<String>,
    handlers: Vec<Box<dyn CapHandler>>,
}

impl CapNegotiator {
    /// Create an idle machine with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            negotiating: false,
            outstanding: 0,
            ls_buffer: Vec::new(),
            list_buffer: Vec::new(),
            entries: HashMap::new(),
            enabled: HashSet::new(),
            handlers: Vec::new(),
        }
    }

    /// Append a handler to the chain. Handlers run in registration order.
    pub fn add_handler(&mut self, handler: Box<dyn CapHandler>) {
        self.handlers.push(handler);
    }

    /// Begin negotiation: returns the `CAP LS 302` request.
    pub fn begin(&mut self) -> Vec<CapAction> {
        self.negotiating = true;
        self.outstanding = 0;
        self.ls_buffer.clear();
        self.list_buffer.clear();
        vec![CapAction::Send("CAP LS 302".to_string())]
    }

    /// End negotiation explicitly.
    ///
    /// For use by handlers that deferred the end decision. No-op when
    /// negotiation already ended.
    pub fn finish(&mut self) -> Vec<CapAction> {
        if self.negotiating {
            self.negotiating = false;
            vec![CapAction::Send("CAP END".to_string())]
        } else {
            Vec::new()
        }
    }

    /// Whether the initial handshake is still open.
    #[must_use]
    pub fn is_negotiating(&self) -> bool {
        self.negotiating
    }

    /// Names of currently enabled capabilities.
    #[must_use]
    pub fn enabled_caps(&self) -> &HashSet<String> {
        &self.enabled
    }

    /// Whether a capability is currently enabled.
    #[must_use]
    pub fn is_enabled(&self, capability: impl AsRef<str>) -> bool {
        self.enabled.contains(capability.as_ref())
    }

    /// The current entry for a capability, if known.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&CapEntry> {
        self.entries.get(name)
    }

    /// All current entries, disabled ones included.
    pub fn entries(&self) -> impl Iterator<Item = &CapEntry> {
        self.entries.values()
    }

    /// Discard all negotiation state, keeping registered handlers.
    pub fn reset(&mut self) {
        self.negotiating = false;
        self.outstanding = 0;
        self.ls_buffer.clear();
        self.list_buffer.clear();
        self.entries.clear();
        self.enabled.clear();
    }

    /// Feed a parsed CAP line.
    ///
    /// Malformed lines are reported and their effect dropped; the machine
    /// never fails.
    pub fn feed(&mut self, msg: &RawMessage) -> Vec<CapAction> {
        let mut actions = Vec::new();

        let Some(sub) = msg.param(1) else {
            actions.push(defect(msg, CapProtocolError::MissingSubcommand));
            return actions;
        };

        match sub.to_ascii_uppercase().as_str() {
            "LS" => self.on_batched(msg, true, &mut actions),
            "LIST" => self.on_batched(msg, false, &mut actions),
            "ACK" => self.on_answer(msg, Answer::Ack, &mut actions),
            "NAK" => self.on_answer(msg, Answer::Nak, &mut actions),
            "NEW" => self.on_answer(msg, Answer::New, &mut actions),
            "DEL" => self.on_answer(msg, Answer::Del, &mut actions),
            other => {
                actions.push(defect(
                    msg,
                    CapProtocolError::UnknownSubcommand {
                        sub: other.to_string(),
                    },
                ));
            }
        }

        actions
    }

    /// LS and LIST arrive possibly multi-line: a `*` before the payload
    /// marks a continuation. Handlers only ever observe the merged batch.
    fn on_batched(&mut self, msg: &RawMessage, is_ls: bool, actions: &mut Vec<CapAction>) {
        let (more, payload) = if msg.param(2) == Some("*") {
            (true, msg.param(3))
        } else {
            (false, msg.param(2))
        };

        let Some(payload) = payload else {
            let sub = if is_ls { "LS" } else { "LIST" };
            actions.push(defect(
                msg,
                CapProtocolError::MissingCapList {
                    sub: sub.to_string(),
                },
            ));
            return;
        };

        let buffer = if is_ls {
            &mut self.ls_buffer
        } else {
            &mut self.list_buffer
        };
        buffer.extend(
            parse_caps(payload).map(|(name, value, _)| (name.to_string(), value.map(String::from))),
        );
        if more {
            return;
        }

        let drained = if is_ls {
            mem::take(&mut self.ls_buffer)
        } else {
            mem::take(&mut self.list_buffer)
        };
        let batch: Vec<CapEntry> = drained
            .into_iter()
            .map(|(name, value)| CapEntry::advertised(name, value))
            .collect();

        for entry in &batch {
            self.entries.insert(entry.name.clone(), entry.clone());
        }

        if is_ls {
            let mut out = NegotiationOutcome::default();
            for handler in &mut self.handlers {
                handler.on_ls(&batch, &mut out);
            }
            self.apply_outcome(out, true, actions);
        } else {
            self.enabled = batch.iter().map(|e| e.name.clone()).collect();
            for handler in &mut self.handlers {
                handler.on_list(&batch);
            }
        }
    }

    fn on_answer(&mut self, msg: &RawMessage, kind: Answer, actions: &mut Vec<CapAction>) {
        let Some(payload) = msg.param(2) else {
            let sub = match kind {
                Answer::Ack => "ACK",
                Answer::Nak => "NAK",
                Answer::New => "NEW",
                Answer::Del => "DEL",
            };
            actions.push(defect(
                msg,
                CapProtocolError::MissingCapList {
                    sub: sub.to_string(),
                },
            ));
            return;
        };

        let mut affected = Vec::new();
        for (name, value, removal) in parse_caps(payload) {
            let entry = match kind {
                Answer::Ack => {
                    if removal {
                        self.enabled.remove(name);
                        // Still available on the server; keep the
                        // existing advertisement.
                        let prior = self.entries.get(name).and_then(|e| e.value.clone());
                        CapEntry::advertised(name.to_string(), prior)
                    } else {
                        self.enabled.insert(name.to_string());
                        let value = value
                            .map(String::from)
                            .or_else(|| self.entries.get(name).and_then(|e| e.value.clone()));
                        CapEntry::advertised(name.to_string(), value)
                    }
                }
                Answer::Nak | Answer::Del => {
                    self.enabled.remove(name);
                    let prior = self.entries.get(name).and_then(|e| e.value.clone());
                    CapEntry {
                        name: name.to_string(),
                        value: value.map(String::from).or(prior),
                        disabled: true,
                        since: Utc::now(),
                    }
                }
                Answer::New => CapEntry::advertised(name.to_string(), value.map(String::from)),
            };
            self.entries.insert(entry.name.clone(), entry.clone());
            affected.push(entry);
        }

        let end_eligible = match kind {
            Answer::Ack | Answer::Nak => {
                self.outstanding = self.outstanding.saturating_sub(1);
                true
            }
            // NEW/DEL are informational outside the handshake.
            Answer::New | Answer::Del => false,
        };

        let mut out = NegotiationOutcome::default();
        for handler in &mut self.handlers {
            match kind {
                Answer::Ack => handler.on_ack(&affected, &mut out),
                Answer::Nak => handler.on_nak(&affected, &mut out),
                Answer::New => handler.on_new(&affected, &mut out),
                Answer::Del => handler.on_del(&affected, &mut out),
            }
        }
        self.apply_outcome(out, end_eligible, actions);
    }

    /// The end decision happens exactly once per event, here, after all
    /// handlers ran.
    fn apply_outcome(
        &mut self,
        out: NegotiationOutcome,
        end_eligible: bool,
        actions: &mut Vec<CapAction>,
    ) {
        if !out.requests.is_empty() {
            actions.push(CapAction::Send(format!(
                "CAP REQ :{}",
                out.requests.join(" ")
            )));
            self.outstanding += 1;
        }

        if end_eligible
            && self.negotiating
            && self.outstanding == 0
            && !out.defer_end
        {
            self.negotiating = false;
            actions.push(CapAction::Send("CAP END".to_string()));
        }
    }
}

impl Default for CapNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CapNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapNegotiator")
            .field("negotiating", &self.negotiating)
            .field("outstanding", &self.outstanding)
            .field("enabled", &self.enabled)
            .field("entries", &self.entries.len())
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

fn defect(msg: &RawMessage, cause: CapProtocolError) -> CapAction {
    tracing::warn!(line = msg.original(), %cause, "malformed CAP line dropped");
    CapAction::Report(ProtocolDefect::Cap {
        line: msg.original().to_string(),
        cause,
    })
}

/// Split a capability payload into `(name, value, removal)` tokens.
fn parse_caps(payload: &str) -> impl Iterator<Item = (&str, Option<&str>, bool)> {
    payload.split_whitespace().map(|token| {
        let (removal, token) = match token.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, token),
        };
        match token.split_once('=') {
            Some((name, value)) => (name, Some(value), removal),
            None => (token, None, removal),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cap_line(line: &str) -> RawMessage {
        RawMessage::parse(line).unwrap()
    }

    fn sends(actions: &[CapAction]) -> Vec<&str> {
        actions
            .iter()
            .filter_map(|a| match a {
                CapAction::Send(line) => Some(line.as_str()),
                CapAction::Report(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_capability_names_round_trip() {
        assert_eq!(Capability::MultiPrefix.as_ref(), "multi-prefix");
        assert_eq!(Capability::from("sasl"), Capability::Sasl);
        assert_eq!(
            Capability::from("example.org/custom"),
            Capability::Custom("example.org/custom".to_string())
        );
        assert_eq!(Capability::from("chghost").to_string(), "chghost");
    }

    #[test]
    fn test_ls_with_no_handlers_ends_immediately() {
        let mut caps = CapNegotiator::new();
        assert_eq!(sends(&caps.begin()), vec!["CAP LS 302"]);

        let actions = caps.feed(&cap_line(":irc.example CAP * LS :sasl multi-prefix"));
        assert_eq!(sends(&actions), vec!["CAP END"]);
        assert!(!caps.is_negotiating());
        // LS alone enables nothing.
        assert!(caps.enabled_caps().is_empty());
        assert!(caps.entry("sasl").is_some());
    }

    #[test]
    fn test_ls_req_ack_flow() {
        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(RequestCaps::new(["sasl"])));
        let _ = caps.begin();

        let actions = caps.feed(&cap_line(":irc.example CAP * LS :sasl multi-prefix"));
        assert_eq!(sends(&actions), vec!["CAP REQ :sasl"]);
        assert!(caps.is_negotiating());

        let actions = caps.feed(&cap_line(":irc.example CAP * ACK :sasl"));
        assert_eq!(sends(&actions), vec!["CAP END"]);
        assert!(caps.is_enabled("sasl"));
        assert_eq!(caps.enabled_caps().len(), 1);
    }

    #[test]
    fn test_multiline_ls_merges_before_handlers() {
        use std::sync::{Arc, Mutex};

        struct Observed(Arc<Mutex<Vec<String>>>);
        impl CapHandler for Observed {
            fn on_ls(&mut self, advertised: &[CapEntry], _out: &mut NegotiationOutcome) {
                let mut seen = self.0.lock().unwrap();
                seen.extend(advertised.iter().map(|e| e.name.clone()));
            }
        }

        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(Observed(seen.clone())));
        let _ = caps.begin();

        let actions = caps.feed(&cap_line(":irc.example CAP * LS * :sasl batch"));
        assert!(actions.is_empty());
        assert!(caps.is_negotiating());
        assert!(seen.lock().unwrap().is_empty());

        let actions = caps.feed(&cap_line(":irc.example CAP * LS :server-time"));
        assert_eq!(sends(&actions), vec!["CAP END"]);
        // Exactly one on_ls call, with the merged batch.
        assert_eq!(*seen.lock().unwrap(), vec!["sasl", "batch", "server-time"]);
        assert!(caps.entry("sasl").is_some());
        assert!(caps.entry("server-time").is_some());
    }

    #[test]
    fn test_ls_value_is_retained() {
        let mut caps = CapNegotiator::new();
        let _ = caps.begin();
        let _ = caps.feed(&cap_line(":irc.example CAP * LS :sasl=PLAIN,EXTERNAL"));
        assert_eq!(
            caps.entry("sasl").and_then(|e| e.value.as_deref()),
            Some("PLAIN,EXTERNAL")
        );
    }

    #[test]
    fn test_nak_disables_and_ends() {
        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(RequestCaps::new(["sasl"])));
        let _ = caps.begin();
        let _ = caps.feed(&cap_line(":irc.example CAP * LS :sasl"));

        let actions = caps.feed(&cap_line(":irc.example CAP * NAK :sasl"));
        assert_eq!(sends(&actions), vec!["CAP END"]);
        assert!(!caps.is_enabled("sasl"));
        assert!(caps.entry("sasl").map(|e| e.disabled).unwrap_or(false));
    }

    #[test]
    fn test_ack_removal_disables_without_flag() {
        let mut caps = CapNegotiator::new();
        let _ = caps.begin();
        let _ = caps.feed(&cap_line(":irc.example CAP * LS :echo-message"));
        let _ = caps.feed(&cap_line(":irc.example CAP * ACK :echo-message"));
        assert!(caps.is_enabled("echo-message"));

        let _ = caps.feed(&cap_line(":irc.example CAP * ACK :-echo-message"));
        assert!(!caps.is_enabled("echo-message"));
        // Not a DEL/NAK; still advertised as available.
        assert_eq!(caps.entry("echo-message").map(|e| e.disabled), Some(false));
    }

    #[test]
    fn test_new_and_del_outside_handshake() {
        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(RequestCaps::new(["away-notify"])));
        let _ = caps.begin();
        let _ = caps.feed(&cap_line(":irc.example CAP * LS :sasl"));
        assert!(!caps.is_negotiating());

        // NEW may trigger a REQ but never CAP END.
        let actions = caps.feed(&cap_line(":irc.example CAP nick NEW :away-notify"));
        assert_eq!(sends(&actions), vec!["CAP REQ :away-notify"]);

        let _ = caps.feed(&cap_line(":irc.example CAP nick ACK :away-notify"));
        assert!(caps.is_enabled("away-notify"));

        let actions = caps.feed(&cap_line(":irc.example CAP nick DEL :away-notify"));
        assert!(sends(&actions).is_empty());
        assert!(!caps.is_enabled("away-notify"));
        assert_eq!(caps.entry("away-notify").map(|e| e.disabled), Some(true));
    }

    #[test]
    fn test_list_replaces_enabled_set() {
        let mut caps = CapNegotiator::new();
        let _ = caps.feed(&cap_line(":irc.example CAP nick LIST * :sasl"));
        let _ = caps.feed(&cap_line(":irc.example CAP nick LIST :server-time"));
        assert!(caps.is_enabled("sasl"));
        assert!(caps.is_enabled("server-time"));

        let _ = caps.feed(&cap_line(":irc.example CAP nick LIST :sasl"));
        assert!(!caps.is_enabled("server-time"));
    }

    #[test]
    fn test_deferred_end_waits_for_finish() {
        struct Deferring;
        impl CapHandler for Deferring {
            fn on_ls(&mut self, _advertised: &[CapEntry], out: &mut NegotiationOutcome) {
                out.defer_end();
            }
        }

        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(Deferring));
        let _ = caps.begin();

        let actions = caps.feed(&cap_line(":irc.example CAP * LS :sasl"));
        assert!(sends(&actions).is_empty());
        assert!(caps.is_negotiating());

        assert_eq!(sends(&caps.finish()), vec!["CAP END"]);
        assert!(sends(&caps.finish()).is_empty());
    }

    #[test]
    fn test_malformed_cap_lines_report() {
        let mut caps = CapNegotiator::new();
        let actions = caps.feed(&cap_line(":irc.example CAP *"));
        assert!(matches!(
            &actions[0],
            CapAction::Report(ProtocolDefect::Cap {
                cause: CapProtocolError::MissingSubcommand,
                ..
            })
        ));

        let actions = caps.feed(&cap_line(":irc.example CAP * ACK"));
        assert!(matches!(
            &actions[0],
            CapAction::Report(ProtocolDefect::Cap {
                cause: CapProtocolError::MissingCapList { .. },
                ..
            })
        ));

        let actions = caps.feed(&cap_line(":irc.example CAP * FROB :x"));
        assert!(matches!(
            &actions[0],
            CapAction::Report(ProtocolDefect::Cap {
                cause: CapProtocolError::UnknownSubcommand { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_reset_keeps_handlers() {
        let mut caps = CapNegotiator::new();
        caps.add_handler(Box::new(RequestCaps::new(["sasl"])));
        let _ = caps.begin();
        let _ = caps.feed(&cap_line(":irc.example CAP * LS :sasl"));
        let _ = caps.feed(&cap_line(":irc.example CAP * ACK :sasl"));
        assert!(caps.is_enabled("sasl"));

        caps.reset();
        assert!(caps.enabled_caps().is_empty());

        // Handler still present after reset: LS triggers a REQ again.
        let _ = caps.begin();
        let actions = caps.feed(&cap_line(":irc.example CAP * LS :sasl"));
        assert_eq!(sends(&actions), vec!["CAP REQ :sasl"]);
    }
}
