//! HTTP API for Doru

mod auth;
mod drugstores;
mod server;
mod session;

pub use server::{router, start_server, AppState};
pub use session::CurrentUser;
