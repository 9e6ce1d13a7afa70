use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

const DEFAULT_BASE_URL: &str = "https://app.litetracker.com/services/v5";
const DEFAULT_WEB_URL: &str = "https://app.litetracker.com";
const DEFAULT_POLL_INTERVAL_MS: u64 = 300_000;

/// A token left at the sample value is as good as no token.
const TOKEN_PLACEHOLDER: &str = "your_api_token_here";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("LITETRACKER_TOKEN is required; set it in the environment or a .env file")]
    MissingToken,

    #[error("cannot determine data directory; set LITEMIRROR_DATA_DIR")]
    NoDataDir,

    #[error("create data dir {path}: {detail}")]
    DataDir { path: PathBuf, detail: String },
}

/// Runtime configuration, loaded once at startup and passed by reference into
/// every component constructor. Secrets are redacted in Debug output.
#[derive(Clone, Debug)]
pub struct Config {
    pub token: SecretString,
    pub base_url: String,
    pub web_url: String,
    pub username: String,
    pub email: String,
    pub password: SecretString,
    pub user_id: i64,
    pub project_ids: Vec<i64>,
    pub poll_interval: Duration,
    pub data_dir: PathBuf,
}

impl Config {
    /// Load configuration from the environment, after seeding it from the
    /// first `.env` file found (`LITEMIRROR_ENV_FILE`, `./.env`,
    /// `~/.litemirror/.env`). Real environment variables always win over
    /// file entries. Fails fast before any network activity.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("LITEMIRROR_ENV_FILE") {
            load_env_file(&PathBuf::from(path));
        } else {
            load_env_file(&PathBuf::from(".env"));
            if let Some(home) = home_dir() {
                load_env_file(&home.join(".litemirror").join(".env"));
            }
        }

        let token = env_string("LITETRACKER_TOKEN");
        if token.is_empty() || token == TOKEN_PLACEHOLDER {
            return Err(ConfigError::MissingToken);
        }

        let data_dir = match std::env::var("LITEMIRROR_DATA_DIR") {
            Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => home_dir()
                .ok_or(ConfigError::NoDataDir)?
                .join(".litemirror")
                .join("data"),
        };

        Ok(Self {
            token: SecretString::from(token),
            base_url: env_or(
                "LITETRACKER_BASE_URL",
                DEFAULT_BASE_URL,
            ),
            web_url: env_or("LITETRACKER_WEB_URL", DEFAULT_WEB_URL),
            username: env_string("LITETRACKER_USERNAME"),
            email: env_string("LITETRACKER_EMAIL"),
            password: SecretString::from(env_string("LITETRACKER_PASSWORD")),
            user_id: env_i64("LITETRACKER_USER_ID"),
            project_ids: parse_project_ids(&env_string("LITETRACKER_PROJECT_IDS")),
            poll_interval: Duration::from_millis(
                env_u64("POLL_INTERVAL_MS").unwrap_or(DEFAULT_POLL_INTERVAL_MS),
            ),
            data_dir,
        })
    }

    /// Create the data directory if it does not exist yet.
    pub fn ensure_data_dir(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| ConfigError::DataDir {
            path: self.data_dir.clone(),
            detail: e.to_string(),
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("litemirror.db")
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("litemirror-snapshot.db")
    }

    pub fn poll_state_path(&self) -> PathBuf {
        self.data_dir.join("poll-state.json")
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join("daemon.log")
    }
}

/// Parse a comma-separated id list, skipping blanks and malformed entries.
pub fn parse_project_ids(raw: &str) -> Vec<i64> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}

/// Parse `.env`-style content into key/value pairs. Blank lines and `#`
/// comments are skipped; values keep everything after the first `=`.
pub fn parse_env_lines(contents: &str) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(idx) = line.find('=') else { continue };
        if idx == 0 {
            continue;
        }
        let key = line[..idx].trim();
        let value = line[idx + 1..].trim();
        pairs.push((key.to_string(), value.to_string()));
    }
    pairs
}

fn load_env_file(path: &PathBuf) {
    let Ok(contents) = std::fs::read_to_string(path) else {
        return;
    };
    for (key, value) in parse_env_lines(&contents) {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(key, value);
        }
    }
}

fn env_string(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn env_i64(key: &str) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(0)
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
