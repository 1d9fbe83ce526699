pub mod error;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod repo;
pub mod routes;
pub mod settings;
pub mod usecase;
pub mod validation;

// Re-export commonly used items for tests / external users
pub use routes::{config, AppState};
pub use settings::Settings;
