use std::{sync::Arc, time::Duration};

use teloxide::prelude::*;

use gramcast_core::Error;

use crate::router::AppState;

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Splits an argument string into words, honoring double quotes so that
/// `/broadcast "hello there" bye` yields two arguments.
fn split_quoted(input: &str) -> Result<Vec<String>, String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut seen_any = false;

    for ch in input.chars() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                seen_any = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if seen_any {
                    args.push(std::mem::take(&mut current));
                    seen_any = false;
                }
            }
            c => {
                current.push(c);
                seen_any = true;
            }
        }
    }

    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if seen_any {
        args.push(current);
    }
    Ok(args)
}

fn format_duration(d: Duration) -> String {
    let seconds = d.as_secs();
    let hours = seconds / 3600;
    let mins = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        return format!("{hours}h {mins}m {secs}s");
    }
    if mins > 0 {
        return format!("{mins}m {secs}s");
    }
    format!("{secs}s")
}

const HELP_TEXT: &str = "gramcast commands:\n\
/broadcast \"msg1\" [\"msg2\" ...] - Send rotating messages to every known group\n\
/schedule <times> <interval_hours> \"msg\" - Repeat a broadcast on an interval\n\
/migrate <source> <target> - Invite members of source into target\n\
/stop [job_id] - Stop one job, or every job\n\
/status - Show quota, pacing delay, and active jobs\n\
/help - Show this message";

async fn reply(bot: &Bot, chat_id: ChatId, text: String) {
    if let Err(e) = bot.send_message(chat_id, text).await {
        eprintln!("[TELEGRAM] reply failed: {e}");
    }
}

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let Some(user) = msg.from() else {
        return Ok(());
    };
    // Only the configured admin may drive the orchestrator.
    if user.id.0 as i64 != state.cfg.admin_user_id {
        return Ok(());
    }
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if !text.trim_start().starts_with('/') {
        return Ok(());
    }

    let (cmd, arg) = parse_command(text);
    let chat_id = msg.chat.id;

    match cmd.as_str() {
        "start" | "help" => {
            reply(&bot, chat_id, HELP_TEXT.to_string()).await;
        }

        "broadcast" => {
            let messages = match split_quoted(&arg) {
                Ok(m) => m,
                Err(e) => {
                    reply(&bot, chat_id, format!("Bad arguments: {e}")).await;
                    return Ok(());
                }
            };
            match state.orch.start_broadcast(messages).await {
                Ok(job_id) => reply(&bot, chat_id, format!("Broadcast {job_id} started")).await,
                Err(e) => reply(&bot, chat_id, format!("Cannot start broadcast: {e}")).await,
            }
        }

        "schedule" => {
            match parse_schedule_args(&arg) {
                Ok((times, interval, message)) => {
                    match state.orch.start_schedule(times, interval, message).await {
                        Ok(job_id) => {
                            reply(
                                &bot,
                                chat_id,
                                format!(
                                    "Schedule {job_id} started: {times} runs every {}",
                                    format_duration(interval)
                                ),
                            )
                            .await
                        }
                        Err(e) => reply(&bot, chat_id, format!("Cannot schedule: {e}")).await,
                    }
                }
                Err(e) => {
                    reply(
                        &bot,
                        chat_id,
                        format!("Bad arguments: {e}\nUsage: /schedule <times> <interval_hours> \"message\""),
                    )
                    .await
                }
            }
        }

        "migrate" => {
            let mut words = arg.split_whitespace();
            let (Some(source), Some(target)) = (words.next(), words.next()) else {
                reply(
                    &bot,
                    chat_id,
                    "Usage: /migrate <source_group> <target_group>".to_string(),
                )
                .await;
                return Ok(());
            };
            match state
                .orch
                .start_migration(source.to_string(), target.to_string())
                .await
            {
                Ok(job_id) => reply(&bot, chat_id, format!("Migration {job_id} started")).await,
                Err(Error::Capacity { active, max }) => {
                    reply(
                        &bot,
                        chat_id,
                        format!("Too many migrations running ({active}/{max}); try again later"),
                    )
                    .await
                }
                Err(e) => reply(&bot, chat_id, format!("Cannot start migration: {e}")).await,
            }
        }

        "stop" => {
            let target = arg.trim();
            if target.is_empty() {
                let stopped = state.orch.stop_all().await;
                reply(&bot, chat_id, format!("Stopped {stopped} job(s)")).await;
            } else if state
                .orch
                .cancel(&gramcast_core::domain::JobId(target.to_string()))
                .await
            {
                reply(&bot, chat_id, format!("Stopping {target}")).await;
            } else {
                reply(&bot, chat_id, format!("No job named {target}")).await;
            }
        }

        "status" => {
            let snap = state.orch.status_snapshot().await;
            let mut lines = vec![
                format!("Daily invites: {}/{}", snap.daily_count, snap.daily_limit),
                format!("Current delay: {}", format_duration(snap.current_delay)),
            ];
            if snap.active_jobs.is_empty() {
                lines.push("No active jobs".to_string());
            } else {
                lines.push(format!("Active jobs ({}):", snap.active_jobs.len()));
                for job in &snap.active_jobs {
                    lines.push(format!("  {} [{}]", job.id, job.kind.label()));
                }
            }
            reply(&bot, chat_id, lines.join("\n")).await;
        }

        _ => {
            reply(&bot, chat_id, format!("Unknown command: /{cmd}")).await;
        }
    }

    Ok(())
}

fn parse_schedule_args(arg: &str) -> Result<(u32, Duration, String), String> {
    let words = split_quoted(arg)?;
    if words.len() != 3 {
        return Err(format!("expected 3 arguments, got {}", words.len()));
    }
    let times: u32 = words[0]
        .parse()
        .map_err(|_| format!("invalid repetition count '{}'", words[0]))?;
    let hours: f64 = words[1]
        .parse()
        .map_err(|_| format!("invalid interval '{}'", words[1]))?;
    // Rejects NaN, negative, and overflowing values in one place.
    let interval = Duration::try_from_secs_f64(hours * 3600.0)
        .map_err(|_| format!("invalid interval '{}'", words[1]))?;
    Ok((times, interval, words[2].clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_command_with_bot_suffix() {
        let (cmd, rest) = parse_command("/broadcast@gramcast_bot \"hi\"");
        assert_eq!(cmd, "broadcast");
        assert_eq!(rest, "\"hi\"");
    }

    #[test]
    fn splits_quoted_and_bare_words() {
        let args = split_quoted("\"hello there\" bye \"one more\"").unwrap();
        assert_eq!(args, vec!["hello there", "bye", "one more"]);
    }

    #[test]
    fn empty_quotes_yield_empty_argument() {
        let args = split_quoted("\"\"").unwrap();
        assert_eq!(args, vec![""]);
    }

    #[test]
    fn unterminated_quote_is_rejected() {
        assert!(split_quoted("\"oops").is_err());
    }

    #[test]
    fn schedule_args_accept_fractional_hours() {
        let (times, interval, message) = parse_schedule_args("3 0.5 \"promo text\"").unwrap();
        assert_eq!(times, 3);
        assert_eq!(interval, Duration::from_secs(1800));
        assert_eq!(message, "promo text");
    }

    #[test]
    fn schedule_args_reject_wrong_arity() {
        assert!(parse_schedule_args("3 \"promo\"").is_err());
        assert!(parse_schedule_args("3 abc \"promo\"").is_err());
    }

    #[test]
    fn schedule_args_reject_unrepresentable_intervals() {
        // Overflowing, negative, and NaN intervals are usage errors, not panics.
        assert!(parse_schedule_args("1 1e19 \"x\"").is_err());
        assert!(parse_schedule_args("1 -2 \"x\"").is_err());
        assert!(parse_schedule_args("1 NaN \"x\"").is_err());
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(Duration::from_secs(45)), "45s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(7384)), "2h 3m 4s");
    }
}
