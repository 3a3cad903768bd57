mod handlers;
mod models;
mod state;
mod vectorize;

pub use handlers::{router, run_server};
pub use models::VectorizeResponse;
