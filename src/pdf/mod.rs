//! PDF manipulation module

pub mod create;
pub mod fonts;
pub mod merge;
pub mod outline;
pub mod overlay;
pub mod source;
pub mod toc;

// Re-export commonly used items
pub use fonts::Font;
pub use merge::{assemble, collate, prepare, CollateJob, CollateSummary, CollationPlan};
pub use overlay::{fit_to_canvas, merge_onto, render_overlay};
pub use source::{count_pages, SourceSet};
pub use toc::{render_toc_page, toc_pages, TocLayout};
