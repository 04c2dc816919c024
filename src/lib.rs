//! Ingress route resolution and precedence engine.

pub mod admin;
pub mod config;
pub mod controller;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod resolver;
pub mod routing;
pub mod security;
pub mod store;

pub use config::schema::EngineConfig;
pub use controller::{Controller, Publisher};
pub use http::AdminServer;
pub use lifecycle::Shutdown;
pub use resolver::{Resolution, Resolver};
pub use routing::Dispatcher;
pub use store::StoreSnapshot;
