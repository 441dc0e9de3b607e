//! Reference HTTP service for the web hook engine.
//!
//! Exposes subscription administration and a dispatch trigger for the demo
//! [`actions::ResourceActions`] set.

pub mod actions;
pub mod app;
pub mod config;
