//! The protocol engine: line-in, structured-events-and-actions-out.
//!
//! [`Engine`] owns the registries, the capability negotiator, the actor
//! tracker, and the latest ISUPPORT values, and wires one received line
//! through all of them in order. Like the rest of the crate it is
//! sans-IO: the caller reads lines from its transport, feeds them here
//! strictly in arrival order, and sends back whatever
//! [`EngineAction::Send`] lines come out.
//!
//! Ordering matters: CAP ACK must follow its LS, a nick change must land
//! before later lines referencing the new nick. Feed lines from a single
//! task; only the actor cache is designed for concurrent readers.

use std::collections::HashMap;

use crate::actor::{Actor, ActorTracker};
use crate::caps::{CapAction, CapHandler, CapNegotiator};
use crate::casemap::CaseMapping;
use crate::error::ProtocolDefect;
use crate::isupport::{IsupportParam, IsupportRegistry, ModePrefix};
use crate::message::{CommandToken, RawMessage};
use crate::tag::{TagRegistry, TypedTag};

/// Actions produced while processing a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAction {
    /// Send this raw line to the server.
    Send(String),
    /// A recoverable defect was observed; the offending unit was skipped
    /// or downgraded.
    Report(ProtocolDefect),
}

/// A structured view of one received line.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    /// The parsed line.
    pub message: RawMessage,
    /// Typed interpretation of each tag, in transmission order.
    pub tags: Vec<TypedTag>,
    /// The resolved source actor, if the line carried a prefix.
    pub source: Option<Actor>,
}

/// Result of feeding one line.
#[derive(Debug, Clone)]
pub struct Dispatch {
    /// The decoded message, or `None` when the line failed to parse.
    pub decoded: Option<DecodedMessage>,
    /// Lines to send and defects to report, in order.
    pub actions: Vec<EngineAction>,
}

/// Latest server-advertised ISUPPORT values, newest per name.
#[derive(Debug, Clone, Default)]
pub struct ServerInfo {
    params: HashMap<String, IsupportParam>,
}

impl ServerInfo {
    /// Create an empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a parameter, replacing any prior value for the same name.
    pub fn apply(&mut self, param: IsupportParam) {
        self.params
            .insert(param.name().to_ascii_uppercase(), param);
    }

    /// The latest parameter for a name, if the server sent one.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&IsupportParam> {
        self.params.get(&name.to_ascii_uppercase())
    }

    /// All current parameters, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &IsupportParam> {
        self.params.values()
    }

    /// The advertised network name.
    #[must_use]
    pub fn network(&self) -> Option<&str> {
        match self.get("NETWORK") {
            Some(IsupportParam::Network(name)) => Some(name),
            _ => None,
        }
    }

    /// The advertised channel-type prefixes.
    #[must_use]
    pub fn chan_types(&self) -> Option<&[char]> {
        match self.get("CHANTYPES") {
            Some(IsupportParam::ChanTypes(types)) => Some(types),
            _ => None,
        }
    }

    /// The advertised case mapping.
    #[must_use]
    pub fn case_mapping(&self) -> Option<CaseMapping> {
        match self.get("CASEMAPPING") {
            Some(IsupportParam::CaseMapping(mapping)) => Some(*mapping),
            _ => None,
        }
    }

    /// The advertised membership prefixes.
    #[must_use]
    pub fn prefix(&self) -> Option<&[ModePrefix]> {
        match self.get("PREFIX") {
            Some(IsupportParam::Prefix(pairs)) => Some(pairs),
            _ => None,
        }
    }

    /// Drop all stored parameters.
    pub fn clear(&mut self) {
        self.params.clear();
    }
}

/// Sans-IO protocol engine for one connection.
#[derive(Debug, Default)]
pub struct Engine {
    tags: TagRegistry,
    isupport: IsupportRegistry,
    caps: CapNegotiator,
    actors: ActorTracker,
    server: ServerInfo,
}

impl Engine {
    /// Create an engine with the built-in tag and ISUPPORT decoders and
    /// no capability handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The tag registry; register or remove decoders at any time.
    #[must_use]
    pub fn tag_registry(&self) -> &TagRegistry {
        &self.tags
    }

    /// The ISUPPORT registry; register or remove validators at any time.
    #[must_use]
    pub fn isupport_registry(&self) -> &IsupportRegistry {
        &self.isupport
    }

    /// The capability negotiation machine.
    #[must_use]
    pub fn negotiator(&self) -> &CapNegotiator {
        &self.caps
    }

    /// Mutable access to the negotiation machine (e.g. to call
    /// [`CapNegotiator::finish`] after a deferred end).
    pub fn negotiator_mut(&mut self) -> &mut CapNegotiator {
        &mut self.caps
    }

    /// Append a capability handler to the negotiation chain.
    pub fn add_cap_handler(&mut self, handler: Box<dyn CapHandler>) {
        self.caps.add_handler(handler);
    }

    /// The actor tracker. Safe to read from other threads.
    #[must_use]
    pub fn actors(&self) -> &ActorTracker {
        &self.actors
    }

    /// The latest ISUPPORT values.
    #[must_use]
    pub fn server_info(&self) -> &ServerInfo {
        &self.server
    }

    /// Start capability negotiation; returns the opening lines to send.
    pub fn begin_negotiation(&mut self) -> Vec<EngineAction> {
        self.caps.begin().into_iter().map(cap_action).collect()
    }

    /// Discard all per-connection state (negotiation, ISUPPORT, actors).
    ///
    /// Call on disconnect; state is rebuilt fresh on reconnect.
    /// Registered decoders and capability handlers are kept.
    pub fn reset(&mut self) {
        self.caps.reset();
        self.actors.clear();
        self.server.clear();
    }

    /// Process one received line, in arrival order.
    pub fn feed_line(&mut self, line: &str) -> Dispatch {
        let mut actions = Vec::new();

        let message = match RawMessage::parse(line) {
            Ok(message) => message,
            Err(cause) => {
                tracing::warn!(line, %cause, "skipping unparseable line");
                actions.push(EngineAction::Report(ProtocolDefect::Parse {
                    line: line.trim_end_matches(['\r', '\n']).to_string(),
                    cause,
                }));
                return Dispatch {
                    decoded: None,
                    actions,
                };
            }
        };

        let mut defects = Vec::new();
        let tags: Vec<TypedTag> = message
            .tags
            .iter()
            .map(|t| self.tags.create(t, &mut defects))
            .collect();
        let source = message.prefix.as_deref().map(|p| self.actors.resolve(p));

        self.dispatch(&message, &source, &mut defects, &mut actions);

        actions.extend(defects.into_iter().map(EngineAction::Report));
        Dispatch {
            decoded: Some(DecodedMessage {
                message,
                tags,
                source,
            }),
            actions,
        }
    }

    fn dispatch(
        &mut self,
        message: &RawMessage,
        source: &Option<Actor>,
        defects: &mut Vec<ProtocolDefect>,
        actions: &mut Vec<EngineAction>,
    ) {
        let source_user = source.as_ref().and_then(Actor::user);

        match &message.command {
            CommandToken::Word(word) => match word.as_str() {
                "CAP" => {
                    actions.extend(self.caps.feed(message).into_iter().map(cap_action));
                }
                "NICK" => {
                    if let (Some(user), Some(new)) = (source_user, message.param(0)) {
                        self.actors.note_nick_change(&user.nick, new);
                    }
                }
                "QUIT" => {
                    if let Some(user) = source_user {
                        self.actors.remove_user(&user.nick);
                    }
                }
                "ACCOUNT" => {
                    if let (Some(user), Some(account)) = (source_user, message.param(0)) {
                        // "*" means logged out.
                        let account = (account != "*").then(|| account.to_string());
                        self.actors.note_account(&user.nick, account);
                    }
                }
                "CHGHOST" => {
                    if let (Some(user), Some(ident), Some(host)) =
                        (source_user, message.param(0), message.param(1))
                    {
                        self.actors.note_host_change(&user.nick, ident, host);
                    }
                }
                "JOIN" => {
                    if let (Some(user), Some(channels)) = (source_user, message.param(0)) {
                        for channel in channels.split(',').filter(|c| !c.is_empty()) {
                            self.actors.note_join(channel, user.clone());
                        }
                    }
                }
                "PART" => {
                    if let (Some(user), Some(channels)) = (source_user, message.param(0)) {
                        for channel in channels.split(',').filter(|c| !c.is_empty()) {
                            self.actors.note_part(channel, &user.nick);
                        }
                    }
                }
                "KICK" => {
                    if let (Some(channel), Some(victim)) = (message.param(0), message.param(1)) {
                        self.actors.note_part(channel, victim);
                    }
                }
                _ => {}
            },
            CommandToken::Numeric(5) => self.apply_isupport(message, defects),
            CommandToken::Numeric(_) => {}
        }
    }

    /// RPL_ISUPPORT: `<client> <token>... :are supported by this server`.
    fn apply_isupport(&mut self, message: &RawMessage, defects: &mut Vec<ProtocolDefect>) {
        if message.params.len() < 2 {
            return;
        }
        let mut tokens = &message.params[1..];
        // The human-readable trailing parameter is not a token.
        if let Some(last) = tokens.last() {
            if last.contains(' ') {
                tokens = &tokens[..tokens.len() - 1];
            }
        }

        for token in tokens {
            if token.is_empty() {
                continue;
            }
            let param = self.isupport.create_parameter(token, defects);
            match &param {
                IsupportParam::ChanTypes(types) => {
                    self.actors.set_chan_types(types.iter().copied());
                }
                IsupportParam::CaseMapping(mapping) => {
                    self.actors.set_case_mapping(*mapping);
                }
                _ => {}
            }
            self.server.apply(param);
        }
    }
}

fn cap_action(action: CapAction) -> EngineAction {
    match action {
        CapAction::Send(line) => EngineAction::Send(line),
        CapAction::Report(defect) => EngineAction::Report(defect),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::RequestCaps;
    use crate::error::MessageParseError;

    fn sends(dispatch: &Dispatch) -> Vec<&str> {
        dispatch
            .actions
            .iter()
            .filter_map(|a| match a {
                EngineAction::Send(line) => Some(line.as_str()),
                EngineAction::Report(_) => None,
            })
            .collect()
    }

    fn reports(dispatch: &Dispatch) -> Vec<&ProtocolDefect> {
        dispatch
            .actions
            .iter()
            .filter_map(|a| match a {
                EngineAction::Report(defect) => Some(defect),
                EngineAction::Send(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_handshake_flow() {
        let mut engine = Engine::new();
        engine.add_cap_handler(Box::new(RequestCaps::new(["server-time", "sasl"])));

        let actions = engine.begin_negotiation();
        assert_eq!(actions, vec![EngineAction::Send("CAP LS 302".to_string())]);

        let d = engine.feed_line(":irc.example CAP * LS :sasl server-time echo-message");
        assert_eq!(sends(&d), vec!["CAP REQ :sasl server-time"]);

        let d = engine.feed_line(":irc.example CAP * ACK :sasl server-time");
        assert_eq!(sends(&d), vec!["CAP END"]);
        assert!(engine.negotiator().is_enabled("sasl"));
        assert!(engine.negotiator().is_enabled("server-time"));
        assert!(!engine.negotiator().is_enabled("echo-message"));
    }

    #[test]
    fn test_isupport_flows_into_tracker() {
        let mut engine = Engine::new();
        let d = engine.feed_line(
            ":irc.example 005 nick CHANTYPES=#+ CASEMAPPING=ascii NICKLEN=31 :are supported by this server",
        );
        assert!(reports(&d).is_empty());

        assert_eq!(engine.server_info().chan_types(), Some(&['#', '+'][..]));
        assert_eq!(
            engine.server_info().case_mapping(),
            Some(CaseMapping::Ascii)
        );
        assert_eq!(
            engine.server_info().get("NICKLEN"),
            Some(&IsupportParam::NickLen(31))
        );

        // CHANTYPES now includes '+', so '+ops' classifies as a channel.
        assert!(matches!(
            engine.actors().resolve("+ops"),
            Actor::Channel(_)
        ));
    }

    #[test]
    fn test_isupport_defect_degrades_single_token() {
        let mut engine = Engine::new();
        let d = engine
            .feed_line(":irc.example 005 nick PREFIX=(ov)@ NETWORK=Kitten :are supported by this server");
        assert_eq!(reports(&d).len(), 1);

        // The malformed token degraded; its sibling still decoded.
        assert!(matches!(
            engine.server_info().get("PREFIX"),
            Some(IsupportParam::Raw { .. })
        ));
        assert_eq!(engine.server_info().network(), Some("Kitten"));
    }

    #[test]
    fn test_isupport_resend_replaces() {
        let mut engine = Engine::new();
        let _ = engine.feed_line(":irc.example 005 nick NICKLEN=31 :are supported by this server");
        let _ = engine.feed_line(":irc.example 005 nick NICKLEN=40 :are supported by this server");
        assert_eq!(
            engine.server_info().get("NICKLEN"),
            Some(&IsupportParam::NickLen(40))
        );
    }

    #[test]
    fn test_unparseable_line_reports_and_continues() {
        let mut engine = Engine::new();
        let d = engine.feed_line(":prefix-only");
        assert!(d.decoded.is_none());
        assert!(matches!(
            reports(&d)[0],
            ProtocolDefect::Parse {
                cause: MessageParseError::ParseContext { .. },
                ..
            }
        ));

        // Next line processes normally.
        let d = engine.feed_line("PING :irc.example");
        assert!(d.decoded.is_some());
        assert!(d.actions.is_empty());
    }

    #[test]
    fn test_tag_defect_reported_with_message() {
        let mut engine = Engine::new();
        let d = engine.feed_line("@time=broken :n!u@h PRIVMSG #c :hi");
        let decoded = d.decoded.as_ref().unwrap();
        assert!(matches!(decoded.tags[0], TypedTag::Raw(_)));
        assert_eq!(reports(&d).len(), 1);
    }

    #[test]
    fn test_identity_churn_via_lines() {
        let mut engine = Engine::new();
        let _ = engine.feed_line(":mbaxter!~mbax@kitten.institute JOIN #kitteh");
        let before = engine.actors().user("mbaxter").unwrap();

        let _ = engine.feed_line(":mbaxter!~mbax@kitten.institute NICK :kitteh");
        assert!(engine.actors().user("mbaxter").is_none());
        let after = engine.actors().user("kitteh").unwrap();
        assert!(before.is_stale());
        assert_eq!(after.host, "kitten.institute");

        let roster = engine.actors().channel_roster("#kitteh").unwrap();
        assert_eq!(roster.members[0].nick, "kitteh");

        let _ = engine.feed_line(":kitteh!~mbax@kitten.institute QUIT :bye");
        assert!(engine.actors().user("kitteh").is_none());
        assert!(after.is_stale());
    }

    #[test]
    fn test_kick_updates_roster() {
        let mut engine = Engine::new();
        let _ = engine.feed_line(":alpha!a@h JOIN #chan");
        let _ = engine.feed_line(":beta!b@h JOIN #chan");
        let _ = engine.feed_line(":alpha!a@h KICK #chan beta :out");

        let roster = engine.actors().channel_roster("#chan").unwrap();
        let nicks: Vec<&str> = roster.members.iter().map(|m| m.nick.as_str()).collect();
        assert_eq!(nicks, vec!["alpha"]);
    }

    #[test]
    fn test_reset_discards_connection_state() {
        let mut engine = Engine::new();
        let _ = engine.begin_negotiation();
        let _ = engine.feed_line(":irc.example CAP * LS :sasl");
        let _ = engine.feed_line(":irc.example 005 nick NETWORK=Kitten :are supported by this server");
        let _ = engine.feed_line(":alpha!a@h JOIN #chan");

        engine.reset();
        assert!(engine.negotiator().enabled_caps().is_empty());
        assert!(engine.server_info().network().is_none());
        assert!(engine.actors().user("alpha").is_none());
    }
}
