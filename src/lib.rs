pub mod app;
pub mod auth;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod models;
pub mod routes;
