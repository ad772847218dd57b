//! Bot module for Telegram interactions
//!
//! - `message_handler`: routes incoming messages to the journal
//! - `sender`: paced outbound messages with HTML rendering

pub mod message_handler;
pub mod sender;

pub use message_handler::message_handler;
pub use sender::{Pacer, TelegramSender};
