pub mod app;
pub mod cors;
pub mod headers;
pub mod mode;
pub mod observability;
pub mod proxy;
pub mod response;
pub mod routes;
pub mod shutdown;
pub mod state;
pub mod validation;
