pub mod app;
pub mod auth;
pub mod config;
pub mod cookies;
pub mod db;
pub mod error;
pub mod images;
pub mod outcome;
pub mod posts;
pub mod routes;
pub mod state;
pub mod storage;
pub mod users;
