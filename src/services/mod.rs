//! Services for Doru

pub mod auth;
pub mod drugstores;
pub mod mailer;
pub mod photos;

pub use drugstores::{DrugstoreService, UserId};
pub use mailer::Mailer;
pub use photos::{PhotoError, PhotoSize, PhotoStore};
