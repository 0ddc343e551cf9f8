//! Microsoft Graph adapter: configuration, authentication, error
//! classification, and the [`GraphGateway`] itself.

pub mod auth;
pub mod classify;
pub mod client;
pub mod config;

pub use auth::{ClientCredentials, StaticToken, TokenProvider};
pub use client::{GraphGateway, mail_nickname};
pub use config::GraphConfig;
