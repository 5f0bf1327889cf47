//! HTTP handlers, one module per resource.

pub mod auth;
pub mod catalog;
pub mod chat_flow;
pub mod chats;
pub mod ocr;
pub mod query;
pub mod session;
