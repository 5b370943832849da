pub mod admin;
pub mod start;

use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Giveaway bot commands:")]
pub enum Command {
    #[command(description = "Display this help message")]
    Help,
    #[command(description = "Start the bot and open the app")]
    Start(String),
    #[command(description = "Open the admin panel")]
    Admin,
    #[command(description = "Show bot statistics (admins only)")]
    Stats,
}
