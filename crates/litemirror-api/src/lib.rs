pub mod client;
pub mod session;

pub use client::ReadClient;
pub use session::SessionClient;
