//! Telegram adapter (teloxide).
//!
//! Implements the `gramcast-core` platform and status ports over the
//! Telegram Bot API. The Bot API cannot enumerate dialogs or add users to a
//! group directly, so destinations come from the persisted [`directory`] of
//! chats the bot has been added to, and invites are delivered as single-use
//! invite links sent by direct message.

use async_trait::async_trait;
use std::sync::Arc;

use teloxide::{prelude::*, types::Recipient, ApiError, RequestError};

use gramcast_core::{
    domain::{ChatId, Destination, GroupRef, MemberCandidate, UserId},
    errors::Error,
    platform::{InviteOutcome, PlatformPort, StatusSink},
    Result,
};

pub mod commands;
pub mod directory;
pub mod router;

use directory::ChatDirectory;

#[derive(Clone)]
pub struct TelegramPlatform {
    bot: Bot,
    me_id: u64,
    directory: Arc<ChatDirectory>,
}

impl TelegramPlatform {
    pub fn new(bot: Bot, me_id: u64, directory: Arc<ChatDirectory>) -> Self {
        Self {
            bot,
            me_id,
            directory,
        }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }
}

fn parse_recipient(identifier: &str) -> Option<Recipient> {
    let s = identifier.trim();
    if let Ok(id) = s.parse::<i64>() {
        return Some(Recipient::Id(teloxide::types::ChatId(id)));
    }
    match s.strip_prefix('@') {
        Some(name) if !name.is_empty() => Some(Recipient::ChannelUsername(format!("@{name}"))),
        _ => None,
    }
}

#[async_trait]
impl PlatformPort for TelegramPlatform {
    async fn resolve_group(&self, identifier: &str) -> Result<GroupRef> {
        let recipient = parse_recipient(identifier).ok_or_else(|| {
            Error::Resolution(format!(
                "expected a numeric chat id or @username, got: {identifier}"
            ))
        })?;

        let chat = self
            .bot
            .get_chat(recipient)
            .await
            .map_err(|e| Error::Resolution(format!("{identifier}: {e}")))?;

        if !(chat.is_group() || chat.is_supergroup()) {
            return Err(Error::Resolution(format!("{identifier} is not a group")));
        }

        Ok(GroupRef {
            chat_id: ChatId(chat.id.0),
            title: chat.title().unwrap_or(identifier).to_string(),
        })
    }

    async fn list_members(&self, group: &GroupRef) -> Result<Vec<MemberCandidate>> {
        // The Bot API only exposes the administrator subset of a group's
        // member list; a full snapshot needs user-level credentials.
        let admins = self
            .bot
            .get_chat_administrators(Self::tg_chat(group.chat_id))
            .await
            .map_err(Self::map_err)?;

        Ok(admins
            .into_iter()
            .map(|m| MemberCandidate {
                user_id: UserId(m.user.id.0 as i64),
                username: m.user.username.clone(),
                is_bot: m.user.is_bot,
                is_self: m.user.id.0 == self.me_id,
                // Deleted accounts show up with an empty first name.
                is_deleted: m.user.first_name.is_empty(),
            })
            .collect())
    }

    async fn list_destinations(&self) -> Result<Vec<Destination>> {
        Ok(self.directory.list().await)
    }

    async fn send_message(&self, destination: ChatId, text: &str) -> Result<()> {
        self.bot
            .send_message(Self::tg_chat(destination), text.to_string())
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn invite_member(
        &self,
        target: &GroupRef,
        member: &MemberCandidate,
    ) -> Result<InviteOutcome> {
        let link = match self
            .bot
            .create_chat_invite_link(Self::tg_chat(target.chat_id))
            .member_limit(1)
            .await
        {
            Ok(link) => link,
            Err(RequestError::RetryAfter(d)) => return Ok(InviteOutcome::Cooldown(d)),
            Err(e) => return Err(Self::map_err(e)),
        };

        let text = format!(
            "You are invited to join {}:\n{}",
            target.title, link.invite_link
        );
        match self
            .bot
            .send_message(teloxide::types::ChatId(member.user_id.0), text)
            .await
        {
            Ok(_) => Ok(InviteOutcome::Added),
            Err(RequestError::RetryAfter(d)) => Ok(InviteOutcome::Cooldown(d)),
            Err(RequestError::Api(
                ApiError::BotBlocked
                | ApiError::CantInitiateConversation
                | ApiError::CantTalkWithBots
                | ApiError::UserDeactivated,
            )) => Ok(InviteOutcome::PrivacyRestricted),
            Err(e) => Err(Self::map_err(e)),
        }
    }
}

/// Status sink that messages the operator directly. Send failures surface as
/// errors; the core treats them as best-effort.
#[derive(Clone)]
pub struct TelegramNotifier {
    bot: Bot,
    admin: i64,
}

impl TelegramNotifier {
    pub fn new(bot: Bot, admin: i64) -> Self {
        Self { bot, admin }
    }
}

#[async_trait]
impl StatusSink for TelegramNotifier {
    async fn notify(&self, text: &str) -> Result<()> {
        self.bot
            .send_message(teloxide::types::ChatId(self.admin), text.to_string())
            .await
            .map_err(TelegramPlatform::map_err)?;
        Ok(())
    }
}
