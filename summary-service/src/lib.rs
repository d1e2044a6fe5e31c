pub mod backend;
pub mod config;
pub mod models;
pub mod render;
pub mod service;
pub mod templates;

pub use backend::OpenRouterBackend;
pub use config::ServiceConfig;
pub use models::*;
pub use render::{render_reply, render_summary};
pub use service::{AppState, build_router, create_app};
pub use templates::load_templates;
