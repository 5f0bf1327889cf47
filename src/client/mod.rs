//! Client side of Civic-AI: talks to the REST API and keeps the chat view
//! consistent with the server.

pub mod api;
pub mod render;
pub mod session;
pub mod upload;

pub use api::{ChatApi, ClientError, HttpChatApi};
pub use session::{ChatSession, ChatThread, SendOutcome};
pub use upload::{ImageUpload, UploadError};
