//! Integration Tests Module
//!
//! End-to-end tests for Office Copilot against an in-memory fake document host.
//! Tests cover the request-to-execution scenarios, executor control (pause,
//! cancel, record-only, undo), and cache behavior through the agent.

// Scripted fake host shared by the tests
mod support;

// Request -> clarification -> plan -> execution scenarios
mod scenario_test;

// Executor control through the agent
mod execution_test;

// Cache properties and invalidation through the cached executor
mod cache_test;
