pub mod aggregate;
pub mod config;
pub mod congestion;
pub mod dashboard;
pub mod errors;
pub mod fetch;
pub mod ghost;
pub mod output;
pub mod schema;
pub mod sources;
