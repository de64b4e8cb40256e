// HTTP module: operator-facing server for health, registration and metrics.

pub mod server;

// Re-export server types
pub use server::HttpServer;
