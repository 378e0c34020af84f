pub mod config;
pub mod context;
pub mod error;
pub mod pathpattern;
pub mod route;
pub mod router;

pub use config::GatewayConfig;
pub use context::RequestContext;
pub use error::GatewayError;
pub use route::Route;
pub use router::Router;
