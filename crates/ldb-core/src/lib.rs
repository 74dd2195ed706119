//! Core domain + application logic for the link-desk bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the credential
//! store live behind ports (traits) implemented in adapter crates.

pub mod broadcast;
pub mod captcha;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod flows;
pub mod keyboards;
pub mod logging;
pub mod messaging;
pub mod notify;
pub mod session;
pub mod store;
pub mod urls;

pub use errors::{Error, Result};
