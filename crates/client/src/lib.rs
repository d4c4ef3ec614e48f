//! Client code for larder.
//!
//! This crate provides the HTTP gateway to the upstream application server,
//! behind the [`Network`] trait so the worker can be driven in tests without
//! a live origin.

pub mod gateway;

pub use gateway::{GatewayConfig, HttpGateway, Network};
