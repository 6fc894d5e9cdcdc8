pub mod client;
pub mod retry;
pub mod stream;

pub use client::ApiClient;
pub use retry::RetryConfig;
pub use stream::{RunStream, SseDecoder};
pub use threadline_api;
