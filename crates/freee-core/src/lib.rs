//! Core library for the freee document reporter: OAuth session handling, the
//! bearer-authenticated API client and the invoice/quotation services.

pub mod api;
pub mod auth;
pub mod config;
pub mod services;

#[cfg(test)]
mod test_support;
