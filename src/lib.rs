//! # taskalloc
//!
//! Task allocation and performance engine for project teams.
//!
//! Employees carry a performance score (adjusted by review outcomes) and a
//! workload percentage (derived from their active task count); both gate
//! whether new work may be assigned to them. Tasks move through a
//! review-gated lifecycle, every accepted transition leaves an audit trail,
//! and project statistics are recomputed from the task set on every
//! mutation so they can never drift.
//!
//! The [`engine::Engine`] is the public API. It persists through the
//! SQLite-backed [`storage`] layer and emits [`notify::Notification`]
//! intents for the caller to deliver after commit.

pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod notify;
pub mod policy;
pub mod storage;
