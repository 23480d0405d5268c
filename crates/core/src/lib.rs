pub mod config;
pub mod error;
pub mod persona;
pub mod session;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use persona::Persona;
pub use session::Session;
