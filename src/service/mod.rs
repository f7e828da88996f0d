//! Store access by collection name, and the admin operations built on it.

mod admin;
mod gateway;
pub use admin::{AdminService, FormFields};
pub use gateway::{Gateway, META_COLLECTION};
