pub mod auth;
pub mod listing;
pub mod payment;
pub mod user;

use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}
