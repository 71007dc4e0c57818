pub mod audit;
pub mod auth;
pub mod configuration;
pub mod directory;
pub mod error;
pub mod identity;
pub mod media;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod startup;
pub mod telemetry;
pub mod validators;
