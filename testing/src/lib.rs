//! # Shortloop Testing
//!
//! Testing utilities for the shortloop client architecture.
//!
//! The main entry point is [`ReducerTest`], a fluent Given-When-Then
//! harness for exercising reducers as pure functions, plus the
//! [`reducer_test::assertions`] helpers for inspecting effect lists.

pub mod reducer_test;

pub use reducer_test::{assertions, ReducerTest};
