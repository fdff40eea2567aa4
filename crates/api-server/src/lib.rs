#![warn(clippy::unwrap_used)]

pub mod cron_rest;
pub mod rest;
pub mod server;
pub mod staysnet_rest;
pub mod swagger;

pub use server::ApiServer;
pub use swagger::ApiDoc;
