#[cfg(test)]
mod tests;

#[cfg(test)]
pub use tests::support;

pub mod config;
pub mod controller;
pub mod health;
pub mod http;
pub mod metrics;
pub mod model;
pub mod registry;
pub mod shutdown;
pub mod store;
