//! HTTP adapter for the collaborator REST API.

mod rest_api;

pub use rest_api::{RestApiConfig, RestEntityApi};
