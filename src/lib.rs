pub mod aggregate;
pub mod api;
pub mod auth;
pub mod core;
pub mod forms;
pub mod main_module;
pub mod page;
pub mod records;

pub use crate::core::shared::state::AppState;
pub use main_module::build_router;
