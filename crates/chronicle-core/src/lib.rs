//! Core types and the state-reconstruction engine for Chronicle.
//!
//! This crate is free of HTTP, database and filesystem
//! dependencies. Wire adapters, stores and fetchers live in their own crates
//! and talk to the core through the traits defined here.
//!
//! Data flows one issue at a time:
//!
//! ```text
//! raw JSON ── WireAdapter ──▶ IssueSkeleton + RawEvent + RawComment
//!          ── normalize   ──▶ IssueState + ordered ChangeEvent + Comment
//!          ── rewind      ──▶ original IssueState
//!          ── assemble    ──▶ Issue
//! ```

pub mod assemble;
pub mod error;
pub mod event;
pub mod field;
pub mod normalize;
pub mod person;
pub mod pipeline;
pub mod raw;
pub mod rewind;
pub mod source;
pub mod store;
pub mod tracker;
pub mod vocabulary;

pub use error::{Error, Result, Severity};
