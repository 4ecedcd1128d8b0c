pub mod accounts;
pub mod auth;
pub mod category;
pub mod config;
pub mod db;
pub mod discovery;
pub mod environment;
pub mod errors;
pub mod friends;
pub mod geo;
pub mod location;
pub mod locks;
pub mod meeting;
pub mod normalization;
pub mod participation;
pub mod profile;
pub mod routes;
pub mod store;
pub mod urls;
