//! Session and account authentication service: registration, login and
//! logout with a cookie-carried JWT, email verification and password reset
//! through one-time codes.

pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod notify;
pub mod state;
pub mod users;
