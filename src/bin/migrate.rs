use anyhow::{anyhow, Result};
use giveaway_bot::config::StorageConfig;
use giveaway_bot::database::connection::DatabaseManager;
use giveaway_bot::database::sqlite::sqlite_path;
use std::env;
use std::io;
use std::path::Path;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize basic logging for the migration
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("up");

    match command {
        "migrate" | "up" => run_migrations().await,
        "check" => check_database().await,
        "reset" => reset_database().await,
        "help" | "--help" | "-h" => {
            print_help();
            Ok(())
        }
        _ => {
            eprintln!("Unknown command: {command}");
            print_help();
            std::process::exit(1);
        }
    }
}

fn load_storage() -> Result<StorageConfig> {
    dotenvy::dotenv().ok();
    let storage = StorageConfig::from_env()?;
    println!("📊 Storage: {} ({})", storage.backend_name(), mask_url(&storage));
    Ok(storage)
}

async fn run_migrations() -> Result<()> {
    println!("🔧 Giveaway Bot - Database Migration Tool");
    println!("=========================================");

    let storage = load_storage()?;
    let db = DatabaseManager::connect(&storage)
        .await
        .map_err(|e| anyhow!("Failed to connect to storage: {}", e))?;

    println!("🚀 Running migrations...");
    match db.run_migrations().await {
        Ok(_) => println!("✅ Migrations completed successfully!"),
        Err(e) => {
            eprintln!("❌ Migration failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn check_database() -> Result<()> {
    println!("🔍 Checking storage connection and schema...");

    let storage = load_storage()?;
    let db = DatabaseManager::connect(&storage)
        .await
        .map_err(|e| anyhow!("Failed to connect to storage: {}", e))?;

    if let Err(e) = db.store.ping().await {
        println!("❌ Storage is unreachable: {e}");
        return Ok(());
    }

    match db.store.describe().await {
        Ok(entries) if entries.is_empty() => {
            println!("✅ Storage connection successful, but it is empty");
            println!("💡 Run 'migrate up' to create the schema");
        }
        Ok(entries) => {
            println!("✅ Storage connection successful!");
            println!("📋 Found:");
            for entry in entries {
                println!("  • {entry}");
            }
        }
        Err(e) => {
            println!("⚠️  Storage check failed: {e}");
            println!("💡 Try running 'migrate up' to create the schema");
        }
    }

    Ok(())
}

async fn reset_database() -> Result<()> {
    let storage = load_storage()?;
    let StorageConfig::Sqlite { url } = &storage else {
        return Err(anyhow!("Reset is only supported for SQLite databases"));
    };

    println!("⚠️  WARNING: This will delete ALL data in the database!");
    println!("🤔 Are you sure you want to continue? (yes/no)");

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    if input.trim().to_lowercase() != "yes" {
        println!("❌ Reset cancelled.");
        return Ok(());
    }

    if let Some(db_path) = sqlite_path(url) {
        if Path::new(db_path).exists() {
            std::fs::remove_file(db_path)?;
            println!("🗑️  Deleted database file: {db_path}");
        }
    }

    println!("🔄 Recreating database schema...");
    run_migrations().await?;

    println!("✅ Database reset completed!");
    Ok(())
}

/// Hides file paths and credentials from console output.
fn mask_url(storage: &StorageConfig) -> String {
    match storage {
        StorageConfig::Sqlite { url } => match sqlite_path(url).and_then(|p| Path::new(p).file_name()) {
            Some(filename) => format!("sqlite:.../{}", filename.to_string_lossy()),
            None => url.clone(),
        },
        StorageConfig::Postgres { url, .. } | StorageConfig::KeyValue { url } => match url.rsplit_once('@') {
            Some((scheme_and_credentials, host)) => {
                let scheme = scheme_and_credentials.split("://").next().unwrap_or("postgres");
                format!("{scheme}://***@{host}")
            }
            None => url.split('?').next().unwrap_or(url).to_string(),
        },
    }
}

fn print_help() {
    println!("🎁 Giveaway Bot - Database Migration Tool");
    println!();
    println!("USAGE:");
    println!("    migrate [COMMAND]");
    println!();
    println!("COMMANDS:");
    println!("    migrate, up    Run database migrations (default)");
    println!("    check          Check storage connection and schema");
    println!("    reset          Reset database (SQLite only) - DESTRUCTIVE!");
    println!("    help           Show this help message");
    println!();
    println!("ENVIRONMENT:");
    println!("    DATABASE_URL   sqlite: or postgres:// URL (default: sqlite:./data/giveaways.db)");
    println!("    REPLIT_DB_URL  Key-value store URL, used when DATABASE_URL is not PostgreSQL");
    println!();
    println!("EXAMPLES:");
    println!("    migrate                    # Run migrations");
    println!("    migrate check              # Check storage status");
    println!("    migrate reset              # Reset database (careful!)");
    println!();
}
