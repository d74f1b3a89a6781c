use std::sync::Arc;

use teloxide::{
    dispatching::Dispatcher,
    dptree,
    prelude::*,
    types::{ChatMemberKind, ChatMemberUpdated},
};

use gramcast_core::{config::Config, orchestrator::Orchestrator};

use crate::commands;
use crate::directory::ChatDirectory;
use crate::{TelegramNotifier, TelegramPlatform};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub orch: Orchestrator,
    pub directory: Arc<ChatDirectory>,
}

pub async fn run_polling(cfg: Arc<Config>) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    let me = bot.get_me().await?;
    println!("gramcast started: @{}", me.username());

    let directory = Arc::new(ChatDirectory::load(cfg.chat_directory_file.clone()));
    let platform = Arc::new(TelegramPlatform::new(
        bot.clone(),
        me.id.0,
        directory.clone(),
    ));
    let notifier = Arc::new(TelegramNotifier::new(bot.clone(), cfg.admin_user_id));
    let orch = Orchestrator::new(cfg.clone(), platform, notifier.clone());

    // Best-effort: tell the admin we are up.
    if let Err(e) = bot
        .send_message(
            teloxide::types::ChatId(cfg.admin_user_id),
            "gramcast online. Send /help for commands.",
        )
        .await
    {
        eprintln!("[TELEGRAM] startup notice failed: {e}");
    }

    let state = Arc::new(AppState {
        cfg,
        orch,
        directory,
    });

    let handler = dptree::entry()
        .branch(Update::filter_my_chat_member().endpoint(handle_membership_change))
        .branch(Update::filter_message().endpoint(commands::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Keeps the chat directory in sync as the bot is added to and removed from
/// chats.
async fn handle_membership_change(
    upd: ChatMemberUpdated,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let chat = &upd.chat;
    match upd.new_chat_member.kind {
        ChatMemberKind::Left | ChatMemberKind::Banned(_) => {
            println!("[CHATS] removed from {}", chat.id);
            state.directory.remove(chat.id.0).await;
        }
        _ => {
            let title = chat
                .title()
                .map(str::to_string)
                .unwrap_or_else(|| chat.id.to_string());
            let is_group = chat.is_group() || chat.is_supergroup();
            println!("[CHATS] active in {} ({title})", chat.id);
            state.directory.record(chat.id.0, title, is_group).await;
        }
    }
    Ok(())
}
