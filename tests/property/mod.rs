//! Property-based tests for hublink.
//!
//! These tests use proptest to generate random inputs and verify that
//! key invariants hold for the connection lifecycle and reconnection policies.

mod policy;
mod state_machine;
