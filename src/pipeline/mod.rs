//! Pipeline stages for layout-to-Markdown conversion.
//!
//! Each submodule implements one transformation step and is tested on its
//! own. Per-page stages are pure functions over [`crate::model`] types, so
//! everything after [`extract`] runs without pdfium.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ analyse ──▶ merge ──▶ markdown ──▶ postprocess
//! (path/URL) (pdfium)   (per page)  (cross-page) (render)    (cleanup)
//! ```
//!
//! 1. [`input`]   — resolve a path, URL or byte buffer to a local PDF
//! 2. [`extract`] — text runs, rulings and pictures per page; runs in
//!    `spawn_blocking` because pdfium is not async-safe
//! 3. [`analyse`] — tables ([`tables`]), blocks ([`blocks`]), furniture
//!    ([`furniture`]), labels ([`classify`]) and [`reading_order`]
//! 4. [`merge`]   — paragraph continuations across columns and pages,
//!    caption placement, title demotion
//! 5. [`markdown`] — docling-compatible Markdown; [`encode`] turns pictures
//!    into data URIs for the embedded image mode
//! 6. [`postprocess`] — deterministic text cleanup

pub mod analyse;
pub mod blocks;
pub mod classify;
pub mod encode;
pub mod extract;
pub mod furniture;
pub mod input;
pub mod markdown;
pub mod merge;
pub mod postprocess;
pub mod reading_order;
pub mod tables;
