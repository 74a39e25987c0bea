//! # Pagescribe Architecture
//!
//! Pagescribe lets a user draw on individual pages of a PDF with an external
//! vector editor and merges the drawings back into a copy of the document.
//! Like any front-end built on it, the bundled terminal client only talks to
//! the library through [`api::ScribeApi`].
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (cli/, wired by main.rs)                         │
//! │  - Parses arguments, prints results, runs the shell         │
//! │  - The ONLY place that knows about stdout/stderr/exit codes │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - One open document, unsaved-changes guard                 │
//! │  - Validates user page numbers                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Session Layer (session.rs, loader.rs)                      │
//! │  - Thumbnail, annotate, clear, save, close                  │
//! │  - Background thumbnail loading with cancellation           │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Support (staging.rs, tracker.rs, composer.rs, tools.rs)    │
//! │  - Private staging directory, annotated-page set            │
//! │  - Annotation document template, external programs          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## External Programs
//!
//! All PDF and SVG work is delegated to `qpdf`, `pdftocairo` and `inkscape`
//! through the [`tools::Toolkit`] trait. [`tools::ProcessToolkit`] runs the real
//! programs; tests use `test_utils::StubToolkit`, which records calls and
//! fabricates outputs.
//!
//! ## No I/O Assumptions in Core
//!
//! Everything from `api.rs` inward returns Rust types and reports through the
//! `log` facade. It never writes to stdout/stderr and never exits the process.
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade, entry point for front-ends
//! - [`session`]: One open document and its lifecycle
//! - [`loader`]: Cancellable background thumbnail loading
//! - [`staging`]: The per-session staging directory
//! - [`tracker`]: Set of annotated pages
//! - [`composer`]: Annotation document template and background removal
//! - [`tools`]: External program adapter
//! - [`config`]: Configuration management
//! - [`init`]: Production context setup
//! - [`error`]: Error types

pub mod api;
pub mod composer;
pub mod config;
pub mod error;
pub mod init;
pub mod loader;
pub mod session;
pub mod staging;
pub mod tools;
pub mod tracker;

#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;
