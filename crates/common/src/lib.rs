pub mod bars;
pub mod broker;
pub mod cancel;
pub mod config;
pub mod error;
pub mod notify;
pub mod types;

pub use bars::{BarSource, CsvBarSource};
pub use broker::Broker;
pub use config::Config;
pub use error::{Error, Result};
pub use notify::{notify_best_effort, CommandToggle, Notifier, NoopNotifier};
pub use types::*;
