use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::bot::commands::{admin, start, Command};
use crate::bot::handlers::{BotHandler, HandlerResult};

pub async fn command_handler(
    bot: Bot,
    msg: Message,
    cmd: Command,
    handler: BotHandler,
) -> HandlerResult {
    match cmd {
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string()).await?;
        }
        Command::Start(payload) => {
            start::handle_start(bot, msg, payload, &handler).await?;
        }
        Command::Admin => {
            admin::handle_admin(bot, msg, &handler).await?;
        }
        Command::Stats => {
            admin::handle_stats(bot, msg, &handler).await?;
        }
    }
    Ok(())
}
