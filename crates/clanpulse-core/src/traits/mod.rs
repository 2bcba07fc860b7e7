//! Traits abstracting external collaborators.

mod chat;

pub use chat::{ChannelMessage, ChatGateway};

#[cfg(test)]
pub use chat::MockChatGateway;
