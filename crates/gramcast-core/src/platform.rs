use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, Destination, GroupRef, MemberCandidate},
    Result,
};

/// Outcome of a single invite attempt.
///
/// A rate-limit cooldown is a first-class outcome carrying the wait the
/// platform demanded, not an error string to be parsed downstream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InviteOutcome {
    Added,
    Cooldown(Duration),
    PrivacyRestricted,
}

/// Port onto the remote messaging platform.
///
/// Telegram is the first implementation; the shape is what the engines need,
/// not a model of the platform's full API.
#[async_trait]
pub trait PlatformPort: Send + Sync {
    /// Resolve a group by numeric id or `@username`.
    /// Fails with [`crate::Error::Resolution`] for bad identifiers or no access.
    async fn resolve_group(&self, identifier: &str) -> Result<GroupRef>;

    /// Fetch the member snapshot of a group. Bot accounts may be included;
    /// the migration engine filters them out.
    async fn list_members(&self, group: &GroupRef) -> Result<Vec<MemberCandidate>>;

    /// Enumerate known destinations (groups and one-to-one chats).
    /// Fails with [`crate::Error::Enumeration`] if the listing itself fails.
    async fn list_destinations(&self) -> Result<Vec<Destination>>;

    async fn send_message(&self, destination: ChatId, text: &str) -> Result<()>;

    async fn invite_member(
        &self,
        target: &GroupRef,
        member: &MemberCandidate,
    ) -> Result<InviteOutcome>;
}

/// One-way progress notification channel back to the operator.
///
/// Notification failures must never abort the underlying job; callers log
/// and continue.
#[async_trait]
pub trait StatusSink: Send + Sync {
    async fn notify(&self, text: &str) -> Result<()>;
}
