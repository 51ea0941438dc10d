//! HTTP Layer - RESTful API
//!
//! 统一 errno 信封，业务错误同样返回 HTTP 200

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_routes;
pub use server::HttpServer;
pub use state::{AppDependencies, AppState};
