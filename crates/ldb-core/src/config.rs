use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration, loaded from environment variables (with optional
/// `.env` support for local runs).
#[derive(Clone, Debug)]
pub struct Config {
    // Gateway
    pub bot_token: String,
    /// Subjects allowed to use administrator flows.
    pub admin_ids: Vec<i64>,

    // Store
    pub store_path: PathBuf,

    // Validation
    pub captcha_length: usize,
    pub min_login_length: usize,
    pub min_password_length: usize,

    // Broadcast
    /// Fixed pause applied after every delivery attempt.
    pub broadcast_pace: Duration,
    /// Progress indicator refresh cadence, in processed recipients.
    pub broadcast_progress_every: usize,

    // Sessions
    /// Abandoned flows older than this return to idle; `None` disables expiry.
    pub session_timeout: Option<Duration>,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let admin_ids = parse_csv_i64(env_str("ADMIN_IDS"));
        if admin_ids.is_empty() {
            return Err(Error::Config(
                "ADMIN_IDS environment variable is required".to_string(),
            ));
        }

        let store_path =
            PathBuf::from(env_str("STORE_PATH").unwrap_or("ldb-store.json".to_string()));

        let captcha_length = env_usize("CAPTCHA_LENGTH").unwrap_or(5).clamp(3, 10);
        let min_login_length = env_usize("MIN_LOGIN_LENGTH").unwrap_or(3);
        let min_password_length = env_usize("MIN_PASSWORD_LENGTH").unwrap_or(4);

        let broadcast_pace = Duration::from_millis(env_u64("BROADCAST_PACE_MS").unwrap_or(300));
        let broadcast_progress_every = env_usize("BROADCAST_PROGRESS_EVERY").unwrap_or(25).max(1);

        // 0 disables expiry; abandoned flows then live until cancel/restart.
        let session_timeout = match env_u64("SESSION_TIMEOUT_SECS").unwrap_or(0) {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            bot_token,
            admin_ids,
            store_path,
            captcha_length,
            min_login_length,
            min_password_length,
            broadcast_pace,
            broadcast_progress_every,
            session_timeout,
        })
    }

    pub fn is_admin(&self, id: i64) -> bool {
        self.admin_ids.contains(&id)
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

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_usize(key: &str) -> Option<usize> {
    env_str(key).and_then(|s| s.trim().parse::<usize>().ok())
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        bot_token: "test-token".to_string(),
        admin_ids: vec![1000],
        store_path: PathBuf::from("/tmp/ldb-test-store.json"),
        captcha_length: 5,
        min_login_length: 3,
        min_password_length: 4,
        broadcast_pace: Duration::from_millis(0),
        broadcast_progress_every: 2,
        session_timeout: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_parsing_skips_junk() {
        let ids = parse_csv_i64(Some(" 1, 2,x, ,3 ".to_string()));
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
