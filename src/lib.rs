pub mod auth;
pub mod config;
pub mod db;
pub mod environment;
pub mod errors;
pub mod images;
pub mod info;
pub mod io;
pub mod listing;
pub mod log;
pub mod normalization;
pub mod routes;
pub mod sanitize;
pub mod store;
pub mod urls;
pub mod validation;
