pub mod backends;
pub mod init_config;
pub mod validate;
