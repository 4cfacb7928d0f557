//! Core library for paperpress
//!
//! This crate implements the **Functional Core** of the paperpress tools,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`paperpress_core`** (this crate): pure transformations with no browser
//!   and no PDF parsing
//! - **`pdf`**: page-text extraction on top of `lopdf`
//! - **`paperpress`**: filesystem I/O, the headless browser session and the
//!   command line (the Imperative Shell)
//!
//! Everything here maps finished artifacts (page records, Markdown fragments)
//! to other artifacts (HTML documents, render plans) and can be tested with
//! literal fixture data.
//!
//! # Module Organization
//!
//! - [`pages`]: the per-page extraction record and its JSON form
//! - [`fragments`]: `<!-- PAGE N -->` marker parsing and integrity checks
//! - [`math`]: shielding LaTeX from the Markdown converter
//! - [`markdown`]: Markdown to HTML conversion
//! - [`spread`]: pairing original pages with translations for dual reports
//! - [`template`]: complete HTML documents for each report kind
//! - [`job`]: render modes, report kinds and render jobs
//! - [`workspace`]: working-directory path conventions
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use paperpress_core::fragments::{parse_fragments, MarkerBase};
//! use paperpress_core::spread::plan_spreads;
//!
//! let fragments = parse_fragments(&[markdown], MarkerBase::Zero)?;
//! fragments.check_against(pages.len())?;
//! let spreads = plan_spreads(&pages, &fragments, DEFAULT_PLACEHOLDER);
//! assert_eq!(spreads.len(), pages.len());
//! ```

pub mod error;
pub mod fragments;
pub mod job;
pub mod markdown;
pub mod math;
pub mod pages;
pub mod spread;
pub mod template;
pub mod workspace;

pub use error::CoreError;
