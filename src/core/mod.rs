pub mod chat_stream;
pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod reasoning;
pub mod request;
pub mod session;
pub mod sse;
