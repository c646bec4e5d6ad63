pub mod configure;
pub mod login;
pub mod serve;

pub use configure::ConfigureCommand;
pub use login::LoginCommand;
pub use serve::ServeCommand;
