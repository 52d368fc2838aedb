//! PDF Collation Library
//!
//! A cross-platform library for collating many PDFs into one numbered
//! reading pack. This library provides functionality to:
//! - Build an editable index file from a set of PDFs
//! - Normalise every page onto one canvas size
//! - Number the body pages and lay out a table of contents
//! - Stamp each page with its source title and `X / Y` page number
//! - Assemble cover, TOC and body into a single output file
//!
//! # Example
//!
//! ```no_run
//! use pdf_collate::index::{build_index, write_index};
//! use pdf_collate::pdf::{collate, CollateJob};
//! use std::path::{Path, PathBuf};
//!
//! let entries = build_index(&[
//!     PathBuf::from("1. intro.pdf"),
//!     PathBuf::from("2. advanced.pdf"),
//! ]).expect("Failed to read PDFs");
//! write_index(&entries, Path::new("pack.idx")).expect("Failed to write index");
//!
//! let job = CollateJob::new("pack.idx", "pack.pdf");
//! collate(&job).expect("Failed to collate PDFs");
//! ```

pub mod atomic;
pub mod config;
pub mod error;
pub mod index;
pub mod layout;
pub mod paginate;
pub mod pdf;

// Re-export commonly used items
pub use config::CollateOptions;
pub use error::{Error, Result};
