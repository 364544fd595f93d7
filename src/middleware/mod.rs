//! Ready-made middleware

mod cors;

pub use cors::{cors, CorsOptions};
