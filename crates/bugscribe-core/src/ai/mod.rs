pub mod chat_service;

pub use chat_service::{ChatRequest, ChatService, DeliveryError, HttpChatService};
