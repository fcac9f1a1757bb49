pub mod config;
pub mod error;

pub use config::QcryptConfig;
pub use error::{QcryptError, QcryptResult};
