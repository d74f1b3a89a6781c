/// Platform user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// Platform chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Opaque job identifier. Ids are allocated monotonically and never reused
/// within a process lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    Broadcast,
    ScheduledBroadcast,
    Migration,
}

impl JobKind {
    pub fn label(self) -> &'static str {
        match self {
            JobKind::Broadcast => "broadcast",
            JobKind::ScheduledBroadcast => "scheduled-broadcast",
            JobKind::Migration => "migration",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    pub fn label(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Failed => "failed",
        }
    }
}

/// A resolved group on the remote platform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRef {
    pub chat_id: ChatId,
    pub title: String,
}

/// One entry of the adapter's destination listing.
#[derive(Clone, Debug)]
pub struct Destination {
    pub chat_id: ChatId,
    pub is_group: bool,
    pub title: String,
}

/// Read-only member snapshot entry, fetched once per migration run.
///
/// Bots, the operator's own account, and deleted accounts are ineligible and
/// are skipped without consuming quota.
#[derive(Clone, Debug)]
pub struct MemberCandidate {
    pub user_id: UserId,
    pub username: Option<String>,
    pub is_bot: bool,
    pub is_self: bool,
    pub is_deleted: bool,
}

impl MemberCandidate {
    pub fn display(&self) -> String {
        match &self.username {
            Some(u) => format!("@{u}"),
            None => format!("id:{}", self.user_id.0),
        }
    }
}
