mod api_types;
mod cache;
mod client;
mod types;

pub use client::SlackClient;
pub use types::{format_messages, Message};
