pub mod auth;

pub use auth::{principal_auth_middleware, Claims};
