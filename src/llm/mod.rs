// Chat-completion backends
pub mod client;

pub use client::{ChatClient, ChatClientConfig, ChatModel, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL};
