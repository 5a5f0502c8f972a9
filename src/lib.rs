// Catalog Client - Library root

pub mod auth;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod error;
pub mod http_client;
pub mod navigation;

#[cfg(test)]
mod testing;
