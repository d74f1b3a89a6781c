use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from the environment (with `.env` support).
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub admin_user_id: i64,

    // Pacing
    pub base_delay: Duration,
    pub failure_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter_max: Duration,

    // Limits
    pub broadcast_cap: usize,
    pub daily_limit: u64,
    pub batch_size: usize,

    // Persistence
    pub quota_file: PathBuf,
    pub chat_directory_file: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let telegram_bot_token = env_str("TELEGRAM_BOT_TOKEN").unwrap_or_default();
        if telegram_bot_token.trim().is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_user_id = env_i64("ADMIN_USER_ID").ok_or_else(|| {
            Error::Config("ADMIN_USER_ID environment variable is required".to_string())
        })?;

        let base_delay = Duration::from_secs(env_u64("DELAY_SECONDS").unwrap_or(15));
        let failure_delay = Duration::from_secs(env_u64("FAILURE_DELAY_SECONDS").unwrap_or(30));
        let backoff_multiplier = env_f64("BACKOFF_MULTIPLIER").unwrap_or(1.5);
        let jitter_max = Duration::from_secs(env_u64("JITTER_MAX_SECONDS").unwrap_or(5));

        let broadcast_cap = env_usize("BROADCAST_CAP").unwrap_or(50);
        let daily_limit = env_u64("DAILY_LIMIT").unwrap_or(50);
        let batch_size = env_usize("BATCH_SIZE").unwrap_or(10);

        let quota_file =
            PathBuf::from(env_str("QUOTA_FILE").unwrap_or("/tmp/gramcast-quota.txt".to_string()));
        let chat_directory_file = PathBuf::from(
            env_str("CHAT_DIRECTORY_FILE").unwrap_or("/tmp/gramcast-chats.json".to_string()),
        );

        let cfg = Self {
            telegram_bot_token,
            admin_user_id,
            base_delay,
            failure_delay,
            backoff_multiplier,
            jitter_max,
            broadcast_cap,
            daily_limit,
            batch_size,
            quota_file,
            chat_directory_file,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.backoff_multiplier <= 1.0 {
            return Err(Error::Config(format!(
                "BACKOFF_MULTIPLIER must be > 1, got {}",
                self.backoff_multiplier
            )));
        }
        if self.batch_size == 0 {
            return Err(Error::Config("BATCH_SIZE must be non-zero".to_string()));
        }
        if self.broadcast_cap == 0 {
            return Err(Error::Config("BROADCAST_CAP must be non-zero".to_string()));
        }
        Ok(())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_i64(key: &str) -> Option<i64> {
    env_str(key).and_then(|s| s.trim().parse::<i64>().ok())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_f64(key: &str) -> Option<f64> {
    env_str(key).and_then(|s| s.trim().parse::<f64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

#[cfg(test)]
pub(crate) fn test_config() -> std::sync::Arc<Config> {
    std::sync::Arc::new(Config {
        telegram_bot_token: "x".to_string(),
        admin_user_id: 1,
        base_delay: Duration::from_millis(0),
        failure_delay: Duration::from_millis(0),
        backoff_multiplier: 2.0,
        jitter_max: Duration::from_millis(0),
        broadcast_cap: 50,
        daily_limit: 50,
        batch_size: 10,
        quota_file: std::env::temp_dir().join("gramcast-test-quota.txt"),
        chat_directory_file: std::env::temp_dir().join("gramcast-test-chats.json"),
    })
}
