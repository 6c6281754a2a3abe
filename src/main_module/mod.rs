//! Startup pieces split from main.rs: router assembly, health and shutdown.

mod health;
mod server;
mod shutdown;

pub use health::*;
pub use server::*;
pub use shutdown::*;
