//! Invoice HTTP surface and payload model.

pub mod handlers;
pub mod models;


pub use handlers::config;
pub use models::InvoiceRecord;
