mod grant;
mod init_config;
mod serve;

pub use grant::cmd_grant;
pub use init_config::cmd_init_config;
pub use serve::cmd_serve;
