// JSON surface over the engine operations
pub mod handler;
pub mod models;

pub use handler::AppState;
