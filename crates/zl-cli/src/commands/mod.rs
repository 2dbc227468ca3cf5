//! CLI command implementations

pub mod add;
pub mod config;
pub mod list;
pub mod session;
pub mod watch;

pub use add::{add_command, AddArgs};
pub use config::{config_path, config_show};
pub use list::list_command;
pub use session::{connect_command, disconnect_command, kill_command, remove_command, Credentials};
pub use test::test_command;
pub use watch::watch_command;
