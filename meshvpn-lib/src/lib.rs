pub mod config;
pub mod logging;
pub mod routing;
pub mod shell_command_ext;
