use anyhow::{anyhow, Result};
use std::env;

const DEFAULT_SQLITE_URL: &str = "sqlite:./data/giveaways.db";
const DEFAULT_HTTP_PORT: u16 = 5000;
const DEFAULT_PG_CONNECTIONS: u32 = 5;

/// Which persistent store backs this process. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    /// File-based SQLite database.
    Sqlite { url: String },
    /// PostgreSQL server.
    Postgres { url: String, max_connections: u32 },
    /// Replit-style key-value HTTP store.
    KeyValue { url: String },
}

impl StorageConfig {
    /// Storage selection alone, for tools that never talk to Telegram.
    pub fn from_env() -> Result<Self> {
        storage_from_env()
    }

    /// Short backend name for logs and health output.
    pub fn backend_name(&self) -> &'static str {
        match self {
            StorageConfig::Sqlite { .. } => "sqlite",
            StorageConfig::Postgres { .. } => "postgres",
            StorageConfig::KeyValue { .. } => "key-value",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram_bot_token: String,
    pub bot_username: Option<String>,
    pub storage: StorageConfig,
    pub http_port: u16,
    pub admin_ids: Vec<i64>,
    pub channel_id: Option<String>,
    pub web_app_url: String,
    /// Community TikTok profile shown in the welcome message.
    pub tiktok_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let token = non_empty_var("TELEGRAM_BOT_TOKEN")
            .or_else(|| non_empty_var("BOT_TOKEN"))
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN must be set"))?;

        let port_str = non_empty_var("HTTP_PORT")
            .or_else(|| non_empty_var("PORT"))
            .unwrap_or_else(|| DEFAULT_HTTP_PORT.to_string());
        let http_port = port_str.trim()
            .parse()
            .map_err(|_| anyhow!("Invalid HTTP_PORT"))?;

        let storage = storage_from_env()?;

        let admin_ids = match non_empty_var("ADMIN_IDS") {
            Some(raw) => parse_admin_ids(&raw).unwrap_or_else(|e| {
                tracing::warn!("Invalid ADMIN_IDS format ({}), using empty list", e);
                Vec::new()
            }),
            None => Vec::new(),
        };

        let web_app_url = non_empty_var("WEB_APP_URL")
            .unwrap_or_else(|| format!("http://0.0.0.0:{http_port}"));

        Ok(Config {
            telegram_bot_token: token,
            bot_username: non_empty_var("BOT_USERNAME")
                .map(|name| name.trim().trim_start_matches('@').to_string()),
            storage,
            http_port,
            admin_ids,
            channel_id: non_empty_var("CHANNEL_ID").map(|c| c.trim().to_string()),
            web_app_url,
            tiktok_url: non_empty_var("TIKTOK_URL").map(|u| u.trim().to_string()),
        })
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// A PostgreSQL URL wins, then a key-value store URL, then SQLite.
fn storage_from_env() -> Result<StorageConfig> {
    let database_url = non_empty_var("DATABASE_URL");

    if let Some(url) = database_url.as_deref() {
        let url = url.trim();
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let max_connections = match non_empty_var("POSTGRES_MAX_CONNECTIONS") {
                Some(raw) => raw.trim()
                    .parse()
                    .map_err(|_| anyhow!("Invalid POSTGRES_MAX_CONNECTIONS"))?,
                None => DEFAULT_PG_CONNECTIONS,
            };
            return Ok(StorageConfig::Postgres { url: url.to_string(), max_connections });
        }
    }

    if let Some(url) = non_empty_var("REPLIT_DB_URL") {
        return Ok(StorageConfig::KeyValue { url: url.trim().to_string() });
    }

    let url = match database_url {
        Some(url) if url.trim().starts_with("sqlite:") => url.trim().to_string(),
        Some(url) => return Err(anyhow!("Unsupported DATABASE_URL scheme: {}", url)),
        None => DEFAULT_SQLITE_URL.to_string(),
    };
    Ok(StorageConfig::Sqlite { url })
}

/// Parses a comma separated list of Telegram user ids, skipping blanks.
pub fn parse_admin_ids(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<i64>().map_err(|_| anyhow!("'{}' is not a numeric user id", s)))
        .collect()
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_admin_ids() {
        assert_eq!(parse_admin_ids("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert_eq!(parse_admin_ids(" , 42 ,").unwrap(), vec![42]);
        assert!(parse_admin_ids("1,abc").is_err());
    }

    #[test]
    fn test_backend_names() {
        let sqlite = StorageConfig::Sqlite { url: DEFAULT_SQLITE_URL.to_string() };
        let kv = StorageConfig::KeyValue { url: "http://kv".to_string() };
        assert_eq!(sqlite.backend_name(), "sqlite");
        assert_eq!(kv.backend_name(), "key-value");
    }
}
