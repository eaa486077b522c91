pub mod accounts;
pub mod admin;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod movies;
pub mod profile;
pub mod requests;
pub mod reviews;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;
