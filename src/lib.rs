//! # layout2md
//!
//! Convert PDF documents to Markdown by geometric layout analysis.
//!
//! No OCR and no models: pdfium provides the text runs, drawn lines and
//! embedded images of each page, and a rule-based pipeline recovers the
//! structure from their geometry. The Markdown follows docling's
//! serializer conventions, so results can be checked against
//! `*.text-only.md` expected-output fixtures (see [`fixture`]).
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     resolve local file, URL or byte buffer
//!  ├─ 2. Extract   text runs, rulings, pictures via pdfium (spawn_blocking)
//!  ├─ 3. Analyse   tables, blocks, furniture, labels, reading order (per page)
//!  ├─ 4. Merge     paragraph continuations across columns and pages
//!  ├─ 5. Render    docling-style Markdown, tabulate "github" tables
//!  └─ 6. Polish    deterministic cleanup, assembled document + stats
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use layout2md::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert("document.pdf", &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "{} pages, {} tables, {} pictures",
//!         output.stats.processed_pages, output.stats.total_tables, output.stats.total_pictures
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## pdfium
//!
//! The library binds to pdfium at run time: `PDFIUM_LIB_PATH` when set,
//! otherwise the system library. Everything after extraction is pure Rust
//! and can be driven directly with [`convert_layouts`].

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod fixture;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    ConversionConfig, ConversionConfigBuilder, HeadingStyle, ImageMode, LayoutTolerances,
    PageSelection, PageSeparator, TableStrategy,
};
pub use convert::{
    convert, convert_from_bytes, convert_layouts, convert_sync, convert_to_file, inspect,
};
pub use error::{Layout2MdError, PageError};
pub use fixture::{compare, discover, verify_fixture, Fixture, FixtureOutcome, FixtureReport};
pub use model::{BBox, DocItem, ImageRegion, PageLayout, Ruling, TableData, TextRun};
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata, PageResult};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_from_bytes, stream_layouts, PageStream};
