//! Echo suppression.
//!
//! The room channel is a broadcast bus that includes the sender. Without a
//! filter, a local play would come back and be applied a second time, or be
//! reinterpreted as a remote command and bounce around the room.
//!
//! Chat and presence envelopes are exempt: the sender needs its own chat line
//! and the authoritative online count for its own join.

use cowatch_proto::Envelope;

/// Decides whether an inbound envelope originated locally.
///
/// The default [`UsernameMatcher`] compares usernames, so two connections
/// logged in as the same user suppress each other's playback commands. A
/// matcher keyed on a server-issued connection id can replace it without
/// touching the filter.
pub trait IdentityMatcher {
    /// True if `envelope` was sent by this client.
    fn is_local(&self, envelope: &Envelope) -> bool;
}

/// Matches envelopes whose `username` equals the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsernameMatcher {
    username: String,
}

impl UsernameMatcher {
    /// Matcher for the given local participant.
    pub fn new(username: impl Into<String>) -> Self {
        Self { username: username.into() }
    }

    /// Local participant.
    pub fn username(&self) -> &str {
        &self.username
    }
}

impl IdentityMatcher for UsernameMatcher {
    fn is_local(&self, envelope: &Envelope) -> bool {
        envelope.username() == self.username
    }
}

/// Drops self-originated state-changing envelopes.
#[derive(Debug, Clone)]
pub struct EchoFilter<M = UsernameMatcher> {
    matcher: M,
}

impl<M: IdentityMatcher> EchoFilter<M> {
    /// Filter using the given identity matcher.
    pub fn new(matcher: M) -> Self {
        Self { matcher }
    }

    /// Whether `envelope` should be applied to local state.
    pub fn should_apply(&self, envelope: &Envelope) -> bool {
        envelope.kind().is_presence_or_chat() || !self.matcher.is_local(envelope)
    }

    /// Identity matcher in use.
    pub fn matcher(&self) -> &M {
        &self.matcher
    }
}

/// Username-keyed filter decision without building a filter.
pub fn should_apply(envelope: &Envelope, local_username: &str) -> bool {
    envelope.kind().is_presence_or_chat() || envelope.username() != local_username
}
