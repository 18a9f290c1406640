pub mod deactivate;
pub mod record_login;
pub mod register;
