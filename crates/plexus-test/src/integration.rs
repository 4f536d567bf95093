//! End-to-end protocol scenarios
//!
//! Tests that exercise the full stack across several contexts:
//! - Identity agreement and endpoint uniqueness
//! - Event fan-out
//! - State convergence, late joiners and authority handoff
//! - Guarded writes from parallel subscribers
//! - Hook deferral and authority vacate
