//! Remote multiplexing service management

mod manager;
mod token;
mod version;

pub use manager::ServiceManager;
pub use token::{extract_token, strip_ansi};
pub use version::{is_version_supported, parse_version};
