pub mod composite;
pub mod config;
pub mod games;
pub mod logging;
pub mod play;
pub mod progression;
pub mod server;
pub mod session;
pub mod shape;
pub mod store;
