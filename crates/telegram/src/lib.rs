pub mod commands;
pub mod notifier;
pub mod poller;

pub use commands::{Command, CommandHandler};
pub use notifier::{parse_chat_id, TelegramNotifier};
pub use poller::{CommandPoller, InboundUpdate, TelegramUpdates, UpdateSource};
