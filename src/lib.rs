pub mod app;
pub mod cancel;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod error;
pub mod http;
pub mod normalize;
pub mod output;
pub mod persist;
pub mod providers;
pub mod session;
pub mod store;
