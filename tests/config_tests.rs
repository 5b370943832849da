use giveaway_bot::config::{Config, StorageConfig};
use std::env;
use std::sync::Mutex;

// Mutex to ensure config tests run sequentially to avoid environment variable conflicts
static CONFIG_TEST_MUTEX: Mutex<()> = Mutex::new(());

const VARS: &[&str] = &[
    "TELEGRAM_BOT_TOKEN",
    "BOT_TOKEN",
    "BOT_USERNAME",
    "DATABASE_URL",
    "REPLIT_DB_URL",
    "POSTGRES_MAX_CONNECTIONS",
    "HTTP_PORT",
    "PORT",
    "ADMIN_IDS",
    "CHANNEL_ID",
    "WEB_APP_URL",
    "TIKTOK_URL",
];

fn clear_env() {
    for var in VARS {
        env::remove_var(var);
    }
}

#[test]
fn test_config_from_env_with_all_vars() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token_123");
    env::set_var("BOT_USERNAME", "@drops_bot");
    env::set_var("DATABASE_URL", "sqlite:test.db");
    env::set_var("HTTP_PORT", "8080");
    env::set_var("ADMIN_IDS", "11, 22");
    env::set_var("CHANNEL_ID", "@pubg_drops");
    env::set_var("WEB_APP_URL", "https://drops.example.com");

    let config = Config::from_env().unwrap();

    assert_eq!(config.telegram_bot_token, "test_token_123");
    assert_eq!(config.bot_username.as_deref(), Some("drops_bot"));
    assert_eq!(config.storage, StorageConfig::Sqlite { url: "sqlite:test.db".to_string() });
    assert_eq!(config.http_port, 8080);
    assert_eq!(config.admin_ids, vec![11, 22]);
    assert!(config.is_admin(22));
    assert!(!config.is_admin(33));
    assert_eq!(config.channel_id.as_deref(), Some("@pubg_drops"));
    assert_eq!(config.web_app_url, "https://drops.example.com");

    clear_env();
}

#[test]
fn test_config_from_env_with_defaults() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "required_token");

    let config = Config::from_env().unwrap();

    assert_eq!(config.storage, StorageConfig::Sqlite { url: "sqlite:./data/giveaways.db".to_string() });
    assert_eq!(config.http_port, 5000);
    assert!(config.admin_ids.is_empty());
    assert_eq!(config.channel_id, None);
    assert_eq!(config.web_app_url, "http://0.0.0.0:5000");

    clear_env();
}

#[test]
fn test_config_missing_required_token() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    let result = Config::from_env();
    assert!(result.is_err());

    let error_msg = result.unwrap_err().to_string();
    assert!(error_msg.contains("TELEGRAM_BOT_TOKEN must be set"));

    // Empty counts as missing
    env::set_var("TELEGRAM_BOT_TOKEN", "");
    assert!(Config::from_env().is_err());

    env::set_var("BOT_TOKEN", "fallback_token");
    assert_eq!(Config::from_env().unwrap().telegram_bot_token, "fallback_token");

    clear_env();
}

#[test]
fn test_config_invalid_port() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token");
    env::set_var("HTTP_PORT", "invalid_port");

    let result = Config::from_env();
    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("Invalid HTTP_PORT"));

    env::set_var("HTTP_PORT", "-1");
    assert!(Config::from_env().is_err());

    env::remove_var("HTTP_PORT");
    env::set_var("PORT", " 3000 ");
    assert_eq!(Config::from_env().unwrap().http_port, 3000);

    clear_env();
}

#[test]
fn test_storage_selection() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token");
    env::set_var("REPLIT_DB_URL", "https://kv.example.com/db");
    assert_eq!(
        Config::from_env().unwrap().storage,
        StorageConfig::KeyValue { url: "https://kv.example.com/db".to_string() }
    );

    // PostgreSQL wins over the key-value store
    env::set_var("DATABASE_URL", "postgresql://bot:secret@db/giveaways");
    env::set_var("POSTGRES_MAX_CONNECTIONS", "12");
    assert_eq!(
        Config::from_env().unwrap().storage,
        StorageConfig::Postgres {
            url: "postgresql://bot:secret@db/giveaways".to_string(),
            max_connections: 12,
        }
    );

    env::set_var("POSTGRES_MAX_CONNECTIONS", "many");
    assert!(Config::from_env().is_err());

    env::remove_var("POSTGRES_MAX_CONNECTIONS");
    env::remove_var("REPLIT_DB_URL");
    env::set_var("DATABASE_URL", "mysql://db/giveaways");
    assert!(StorageConfig::from_env().is_err());

    clear_env();
}

#[test]
fn test_invalid_admin_ids_fall_back_to_empty() {
    let _guard = CONFIG_TEST_MUTEX.lock().unwrap();
    clear_env();

    env::set_var("TELEGRAM_BOT_TOKEN", "test_token");
    env::set_var("ADMIN_IDS", "12,not-a-number");

    let config = Config::from_env().unwrap();
    assert!(config.admin_ids.is_empty());

    clear_env();
}
