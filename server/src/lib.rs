pub mod config;
pub mod deadline;
pub mod error;
pub mod http;
pub mod model;
pub mod pipeline;
pub mod source;
pub mod store;
