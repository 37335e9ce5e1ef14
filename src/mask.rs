//! User masks: composable predicates over `nick!user@host` identities.
//!
//! A [`Mask`] is a pure matching rule with no state: single-field masks,
//! a name mask with per-field wildcards, and boolean combinators. Both
//! branches of a combinator are always evaluated; matching has no side
//! effects to short-circuit around.
//!
//! Comparison is literal by default. IRC semantics often want the
//! server's case mapping applied to nick comparison instead; use the
//! `*_mapped` variants for that.

use std::sync::Arc;

use crate::actor::{ChannelRoster, UserSnapshot};
use crate::casemap::CaseMapping;

/// A predicate over a `(nick, user, host)` identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mask {
    /// Matches on host only.
    Host(String),
    /// Matches on nick only.
    Nick(String),
    /// Matches on user string (ident) only.
    UserString(String),
    /// Matches each present field; absent fields match anything.
    Name {
        /// Required nick, if constrained.
        nick: Option<String>,
        /// Required user string, if constrained.
        user: Option<String>,
        /// Required host, if constrained.
        host: Option<String>,
    },
    /// Matches when both inner masks match.
    And(Box<Mask>, Box<Mask>),
    /// Matches when either inner mask matches.
    Or(Box<Mask>, Box<Mask>),
    /// Matches when the inner mask does not.
    Not(Box<Mask>),
}

impl Mask {
    /// Mask matching any user with the given host.
    pub fn host(host: impl Into<String>) -> Self {
        Self::Host(host.into())
    }

    /// Mask matching any user with the given nick.
    pub fn nick(nick: impl Into<String>) -> Self {
        Self::Nick(nick.into())
    }

    /// Mask matching any user with the given user string.
    pub fn user_string(user: impl Into<String>) -> Self {
        Self::UserString(user.into())
    }

    /// Name mask from explicit components; `None` leaves a component
    /// unconstrained.
    pub fn name(nick: Option<String>, user: Option<String>, host: Option<String>) -> Self {
        Self::Name { nick, user, host }
    }

    /// Name mask from a `nick!user@host` pattern.
    ///
    /// Missing components and `*` are unconstrained: `"mbaxter"`
    /// constrains the nick only, `"~mbax@kitten.institute"` the user and
    /// host, `"*!*@kitten.institute"` the host only.
    pub fn name_from_str(pattern: &str) -> Self {
        let (nick, rest) = match pattern.split_once('!') {
            Some((nick, rest)) => (Some(nick), rest),
            None => match pattern.split_once('@') {
                // No `!` but an `@`: user@host shorthand.
                Some(_) => (None, pattern),
                None => (Some(pattern), ""),
            },
        };
        let (user, host) = match rest.split_once('@') {
            Some((user, host)) => (Some(user), Some(host)),
            None if rest.is_empty() => (None, None),
            None => (Some(rest), None),
        };

        let constrain = |part: Option<&str>| {
            part.filter(|p| !p.is_empty() && *p != "*")
                .map(str::to_string)
        };
        Self::Name {
            nick: constrain(nick),
            user: constrain(user),
            host: constrain(host),
        }
    }

    /// Both this mask and `other`.
    #[must_use]
    pub fn and(self, other: Mask) -> Self {
        Self::And(Box::new(self), Box::new(other))
    }

    /// Either this mask or `other`.
    #[must_use]
    pub fn or(self, other: Mask) -> Self {
        Self::Or(Box::new(self), Box::new(other))
    }

    /// The complement of this mask.
    #[must_use]
    pub fn negate(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Test a user snapshot with literal comparison.
    #[must_use]
    pub fn test(&self, user: &UserSnapshot) -> bool {
        self.test_parts(&user.nick, &user.user, &user.host, None)
    }

    /// Test a user snapshot under a case mapping.
    #[must_use]
    pub fn test_mapped(&self, user: &UserSnapshot, mapping: CaseMapping) -> bool {
        self.test_parts(&user.nick, &user.user, &user.host, Some(mapping))
    }

    /// Test a raw `nick!user@host` string with literal comparison.
    ///
    /// Components absent from the string are treated as empty and only
    /// match unconstrained mask fields.
    #[must_use]
    pub fn test_str(&self, identity: &str) -> bool {
        let (nick, user, host) = split_identity(identity);
        self.test_parts(nick, user, host, None)
    }

    /// Members of a channel roster matching this mask, in the roster's
    /// membership order.
    #[must_use]
    pub fn matches_in(&self, roster: &ChannelRoster) -> Vec<Arc<UserSnapshot>> {
        roster
            .members
            .iter()
            .filter(|m| self.test(m))
            .cloned()
            .collect()
    }

    fn test_parts(&self, nick: &str, user: &str, host: &str, mapping: Option<CaseMapping>) -> bool {
        let eq = |a: &str, b: &str| match mapping {
            Some(m) => m.eq(a, b),
            None => a == b,
        };
        match self {
            Self::Host(h) => eq(h, host),
            Self::Nick(n) => eq(n, nick),
            Self::UserString(u) => eq(u, user),
            Self::Name {
                nick: want_nick,
                user: want_user,
                host: want_host,
            } => {
                let field = |want: &Option<String>, actual: &str| match want {
                    Some(w) => eq(w, actual),
                    None => true,
                };
                field(want_nick, nick) && field(want_user, user) && field(want_host, host)
            }
            Self::And(a, b) => {
                let ra = a.test_parts(nick, user, host, mapping);
                let rb = b.test_parts(nick, user, host, mapping);
                ra && rb
            }
            Self::Or(a, b) => {
                let ra = a.test_parts(nick, user, host, mapping);
                let rb = b.test_parts(nick, user, host, mapping);
                ra || rb
            }
            Self::Not(inner) => !inner.test_parts(nick, user, host, mapping),
        }
    }
}

fn split_identity(identity: &str) -> (&str, &str, &str) {
    match identity.split_once('!') {
        Some((nick, rest)) => match rest.split_once('@') {
            Some((user, host)) => (nick, user, host),
            None => (nick, rest, ""),
        },
        None => (identity, "", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorTracker;

    fn user(mask: &str) -> Arc<UserSnapshot> {
        ActorTracker::new().resolve(mask).user().unwrap().clone()
    }

    #[test]
    fn test_name_mask_full_match() {
        let mask = Mask::name_from_str("mbaxter!~mbax@kitten.institute");
        assert!(mask.test(&user("mbaxter!~mbax@kitten.institute")));
        assert!(!mask.test(&user("other!~mbax@kitten.institute")));
        assert!(!mask.test(&user("mbaxter!~other@kitten.institute")));
        assert!(!mask.test(&user("mbaxter!~mbax@other.example")));
    }

    #[test]
    fn test_name_mask_wildcard_components() {
        let mask = Mask::name_from_str("*!*@kitten.institute");
        assert!(mask.test(&user("anyone!~any@kitten.institute")));
        assert!(!mask.test(&user("anyone!~any@other.example")));

        let nick_only = Mask::name_from_str("mbaxter");
        assert!(nick_only.test(&user("mbaxter!~whatever@anywhere.example")));
    }

    #[test]
    fn test_host_mask_ignores_other_fields() {
        let mask = Mask::host("kitten.institute");
        assert!(mask.test(&user("mbaxter!~mbax@kitten.institute")));
        assert!(mask.test(&user("stray!cat@kitten.institute")));
        assert!(!mask.test(&user("mbaxter!~mbax@dog.example")));
    }

    #[test]
    fn test_single_field_masks() {
        let u = user("mbaxter!~mbax@kitten.institute");
        assert!(Mask::nick("mbaxter").test(&u));
        assert!(!Mask::nick("~mbax").test(&u));
        assert!(Mask::user_string("~mbax").test(&u));
        assert!(!Mask::user_string("mbaxter").test(&u));
    }

    #[test]
    fn test_boolean_algebra_laws() {
        let users = [
            user("mbaxter!~mbax@kitten.institute"),
            user("stray!cat@kitten.institute"),
            user("other!one@dog.example"),
        ];
        let m1 = Mask::host("kitten.institute");
        let m2 = Mask::nick("mbaxter");

        for u in &users {
            assert_eq!(
                m1.clone().and(m2.clone()).test(u),
                m1.test(u) && m2.test(u)
            );
            assert_eq!(m1.clone().or(m2.clone()).test(u), m1.test(u) || m2.test(u));
            assert_eq!(m1.clone().negate().test(u), !m1.test(u));
            assert_eq!(m1.clone().negate().negate().test(u), m1.test(u));
        }
    }

    #[test]
    fn test_literal_comparison_is_case_sensitive() {
        let mask = Mask::host("KITTEN.institute");
        assert!(!mask.test(&user("mbaxter!~mbax@kitten.institute")));
        assert!(mask.test_mapped(
            &user("mbaxter!~mbax@kitten.institute"),
            CaseMapping::Ascii
        ));
    }

    #[test]
    fn test_mapped_nick_comparison() {
        let mask = Mask::nick("Nick[a]");
        assert!(!mask.test(&user("nick{a}!u@h")));
        assert!(mask.test_mapped(&user("nick{a}!u@h"), CaseMapping::Rfc1459));
    }

    #[test]
    fn test_test_str() {
        let mask = Mask::name_from_str("*!*@kitten.institute");
        assert!(mask.test_str("anyone!x@kitten.institute"));
        assert!(!mask.test_str("kitten.institute"));

        assert!(Mask::nick("ChanServ").test_str("ChanServ"));
    }

    #[test]
    fn test_matches_in_preserves_roster_order() {
        let tracker = ActorTracker::new();
        for mask in [
            "alpha!a@kitten.institute",
            "beta!b@dog.example",
            "gamma!c@kitten.institute",
        ] {
            let u = tracker.resolve(mask).user().unwrap().clone();
            tracker.note_join("#chan", u);
        }
        let roster = tracker.channel_roster("#chan").unwrap();

        let matches = Mask::host("kitten.institute").matches_in(&roster);
        let nicks: Vec<&str> = matches.iter().map(|m| m.nick.as_str()).collect();
        assert_eq!(nicks, vec!["alpha", "gamma"]);
    }

    #[test]
    fn test_user_host_shorthand() {
        let mask = Mask::name_from_str("~mbax@kitten.institute");
        assert!(mask.test(&user("anybody!~mbax@kitten.institute")));
        assert!(!mask.test(&user("anybody!~other@kitten.institute")));
    }
}
