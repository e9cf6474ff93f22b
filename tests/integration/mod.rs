//! Integration Tests Module
//!
//! Drives the workflow end to end through the recording adapter and an
//! in-memory database.

// Shared harness
mod support;

// Profile, task, links, payout and confirmation
mod blogger_flow_test;

// Staff console, broadcasts and exports
mod admin_console_test;
