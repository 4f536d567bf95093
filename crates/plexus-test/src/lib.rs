//! Plexus Test Harness - Multi-context protocol validation
//!
//! This crate provides:
//! - A cluster of contexts sharing one namespace
//! - Recorders and polling helpers for callback assertions
//! - End-to-end protocol scenarios

pub mod cluster;
pub mod integration;

pub use cluster::*;
