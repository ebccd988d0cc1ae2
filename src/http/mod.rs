mod client;
pub mod headers;
pub mod methods;
mod request;
pub mod status;

pub use client::{POOL_MAX_IDLE_PER_HOST, create_client};
pub use methods::{Resolution, resolve};
pub use request::execute_request;
