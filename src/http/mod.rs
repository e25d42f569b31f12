//! HTTP layer - router and health endpoint

pub mod routes;

pub use routes::build_router;
