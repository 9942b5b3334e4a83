pub mod config;
pub mod error;
pub mod http;
pub mod llm;
pub mod relay;
pub mod server;
