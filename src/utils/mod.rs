pub mod auth;
pub mod ids;
pub mod logging;
pub mod url;
