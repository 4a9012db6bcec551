mod error;
mod server;
mod state;

pub mod routes;

pub use error::ApiError;
pub use server::start_server;
pub use state::AppState;
