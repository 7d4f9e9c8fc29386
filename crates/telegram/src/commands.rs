use tracing::info;

use engine::TradingRuntime;

const HELP: &str = "[COMMANDS]\n\
/help - list commands\n\
/status - show current status\n\
/pause - pause the trading loop\n\
/resume - resume the trading loop\n\
/stop - stop the trading loop";

const UNSUPPORTED: &str = "[INFO] Unsupported command. Send /help for the list.";

/// Operator commands accepted over the chat channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Pause,
    Resume,
    Stop,
    Unsupported,
}

impl Command {
    /// Parse the first word of `text`, ignoring case and a `@botname` suffix.
    pub fn parse(text: &str) -> Self {
        let first = text.split_whitespace().next().unwrap_or_default();
        let word = first.split('@').next().unwrap_or_default().to_lowercase();
        match word.as_str() {
            "/help" | "help" => Command::Help,
            "/status" => Command::Status,
            "/pause" => Command::Pause,
            "/resume" => Command::Resume,
            "/stop" => Command::Stop,
            _ => Command::Unsupported,
        }
    }
}

/// Turns command text into runtime calls and a reply.
#[derive(Clone)]
pub struct CommandHandler {
    runtime: TradingRuntime,
}

impl CommandHandler {
    pub fn new(runtime: TradingRuntime) -> Self {
        Self { runtime }
    }

    pub async fn handle(&self, text: &str) -> String {
        let command = Command::parse(text);
        info!(?command, "Chat command received");

        match command {
            Command::Help => HELP.to_string(),
            Command::Status => {
                let s = self.runtime.status().await;
                format!(
                    "[STATUS] {} | running={} paused={}\n\
                     trades={} skipped={} position={} cash={:.2} equity={:.2}\n\
                     last_signal={} price={:.2} ts={} loops={}",
                    s.symbol,
                    s.running,
                    s.paused,
                    s.trades,
                    s.skipped,
                    s.position_qty,
                    s.cash,
                    s.equity,
                    s.last_signal,
                    s.last_price,
                    s.last_bar_timestamp,
                    s.loop_count,
                )
            }
            Command::Pause => {
                self.runtime.pause().await;
                "[COMMAND] pause requested".to_string()
            }
            Command::Resume => {
                self.runtime.resume().await;
                "[COMMAND] resume requested".to_string()
            }
            Command::Stop => {
                self.runtime.stop().await;
                "[COMMAND] stop requested".to_string()
            }
            Command::Unsupported => UNSUPPORTED.to_string(),
        }
    }
}
