//! The plain-text index file: building it from a set of PDFs, and reading
//! it back after hand editing
//!
//! One entry per line:
//!
//! ```text
//! # comment
//! # set toc_title = Reading pack
//! @ Part one / Background reading
//! papers/intro.pdf | 3 | Introduction
//! papers/other.pdf
//! # BLANK
//! # STOP
//! ```
//!
//! Document lines are `path | page count | title`, where the count and the
//! title are optional. `@` starts a divider whose title may use `/` to break
//! lines on the divider page. `# BLANK` inserts a numbered blank page,
//! `# set key = value` overrides a setting, and `# STOP` ends the index.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::atomic::write_atomically;
use crate::config::CollateOptions;
use crate::error::{Error, Result};
use crate::pdf::source::count_pages;

/// What a plan entry puts into the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Every page of a source PDF
    Document,
    /// One generated page with a title, listed in the TOC
    Divider,
    /// One empty numbered page, not listed in the TOC
    Blank,
}

/// One slot of the final document order
#[derive(Debug, Clone, PartialEq)]
pub struct PlanEntry {
    pub kind: EntryKind,
    /// Display title: file stem for documents, free text for dividers
    pub title: String,
    /// Source file; documents only
    pub path: Option<PathBuf>,
    /// Physical pages this entry contributes; 1 for dividers and blanks
    pub page_count: usize,
    /// 1-based line in the index file, 0 when built in memory
    pub line: usize,
}

impl PlanEntry {
    pub fn document(path: impl Into<PathBuf>, title: impl Into<String>, page_count: usize) -> Self {
        Self {
            kind: EntryKind::Document,
            title: title.into(),
            path: Some(path.into()),
            page_count,
            line: 0,
        }
    }

    pub fn divider(title: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Divider,
            title: title.into(),
            path: None,
            page_count: 1,
            line: 0,
        }
    }

    pub fn blank() -> Self {
        Self {
            kind: EntryKind::Blank,
            title: String::new(),
            path: None,
            page_count: 1,
            line: 0,
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = line;
        self
    }

    /// Whether this entry gets a TOC row
    pub fn is_listed(&self) -> bool {
        self.kind != EntryKind::Blank
    }
}

/// A parsed index line before page counts are resolved
#[derive(Debug, Clone, PartialEq)]
pub enum IndexItem {
    Document {
        path: PathBuf,
        /// Page count cached by `makeindex`, if still present
        pages: Option<usize>,
        /// Title override; defaults to the file stem
        title: Option<String>,
    },
    Divider { title: String },
    Blank,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexLine {
    pub line: usize,
    pub item: IndexItem,
}

/// A `# set key = value` line
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    pub line: usize,
    pub key: String,
    pub value: String,
}

/// An index file as read from disk
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub path: PathBuf,
    pub lines: Vec<IndexLine>,
    pub settings: Vec<Setting>,
}

impl IndexFile {
    /// Apply the file's settings on top of `options`, in file order
    pub fn apply_settings(&self, options: &mut CollateOptions) -> Result<()> {
        for setting in &self.settings {
            options
                .set(&setting.key, &setting.value)
                .map_err(|message| Error::MalformedPlan {
                    path: self.path.clone(),
                    line: setting.line,
                    message,
                })?;
        }
        Ok(())
    }

    /// Number of document lines
    pub fn document_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| matches!(l.item, IndexItem::Document { .. }))
            .count()
    }
}

/// Human title for a source file: its file stem
pub fn title_for(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Read every PDF once and produce one document entry per file
///
/// Paths without a `.pdf` extension are skipped with a warning. The first
/// unreadable PDF aborts the whole build.
pub fn build_index(paths: &[PathBuf]) -> Result<Vec<PlanEntry>> {
    let mut entries = Vec::with_capacity(paths.len());

    for path in paths {
        if !is_pdf(path) {
            warn!("Skipping {}: not a .pdf file", path.display());
            continue;
        }
        let page_count = count_pages(path)?;
        info!("{} ({} pages)", path.display(), page_count);
        entries.push(PlanEntry::document(path, title_for(path), page_count));
    }

    Ok(entries)
}

const INDEX_HEADER: &str = "\
# Collation index. Edit freely, then run `collatepdf makepdf` on this file.
# Comments start with #. Empty lines are ignored.
# Documents:   path/to/file.pdf | page count | title   (count and title optional)
# Dividers:    @ Some title / Subtitle below
# Blank page:  # BLANK
# Settings:    # set toc_title = My title
# Processing stops at a line starting with `# STOP`.
";

/// Render entries in index-file syntax
pub fn format_index(entries: &[PlanEntry]) -> String {
    let mut out = String::from(INDEX_HEADER);
    out.push('\n');

    for entry in entries {
        match entry.kind {
            EntryKind::Document => {
                let path = entry.path.as_deref().unwrap_or_else(|| Path::new(""));
                let mut shown = path.display().to_string();
                // Would read back as a divider or a comment
                if shown.starts_with(|c: char| c == '@' || c == '#') {
                    shown = Path::new(".").join(path).display().to_string();
                }
                out.push_str(&format!(
                    "{} | {} | {}\n",
                    shown,
                    entry.page_count,
                    entry.title
                ));
            }
            EntryKind::Divider => out.push_str(&format!("@ {}\n", entry.title)),
            EntryKind::Blank => out.push_str("# BLANK\n"),
        }
    }

    out
}

/// Write the index to `dest`, replacing any existing file
pub fn write_index(entries: &[PlanEntry], dest: &Path) -> Result<()> {
    let text = format_index(entries);
    write_atomically(dest, |file| {
        file.write_all(text.as_bytes())?;
        Ok(())
    })
}

/// Parse index text; `path` is only used in error messages
pub fn parse_index(text: &str, path: &Path) -> Result<IndexFile> {
    let mut lines = Vec::new();
    let mut settings = Vec::new();

    let malformed = |line: usize, message: String| Error::MalformedPlan {
        path: path.to_path_buf(),
        line,
        message,
    };

    for (i, raw) in text.lines().enumerate() {
        let line = i + 1;
        let text = raw.trim();

        if text.is_empty() {
            continue;
        }
        if text.starts_with("# STOP") {
            break;
        }
        if text == "# BLANK" {
            lines.push(IndexLine { line, item: IndexItem::Blank });
            continue;
        }
        if let Some(rest) = text.strip_prefix("# set ") {
            let (key, value) = rest
                .split_once('=')
                .ok_or_else(|| {
                    malformed(line, format!("expected `# set key = value`, got `{}`", text))
                })?;
            settings.push(Setting {
                line,
                key: key.trim().to_string(),
                value: value.trim().to_string(),
            });
            continue;
        }
        if text.starts_with('#') {
            continue;
        }

        if let Some(title) = text.strip_prefix('@') {
            let title = title.trim();
            if title.is_empty() {
                return Err(malformed(line, "divider line needs a title after `@`".to_string()));
            }
            lines.push(IndexLine {
                line,
                item: IndexItem::Divider { title: title.to_string() },
            });
            continue;
        }

        let mut fields = text.splitn(3, '|').map(str::trim);
        let doc_path = PathBuf::from(fields.next().unwrap_or_default());
        if !is_pdf(&doc_path) {
            return Err(malformed(
                line,
                format!("expected a PDF path, a `@ divider` or a comment, got `{}`", text),
            ));
        }

        let pages = match fields.next() {
            None | Some("") => None,
            Some(count) => match count.parse::<usize>() {
                Ok(n) if n > 0 => Some(n),
                _ => return Err(malformed(line, format!("bad page count `{}`", count))),
            },
        };
        let title = fields.next().filter(|t| !t.is_empty()).map(str::to_string);

        lines.push(IndexLine {
            line,
            item: IndexItem::Document {
                path: doc_path,
                pages,
                title,
            },
        });
    }

    Ok(IndexFile {
        path: path.to_path_buf(),
        lines,
        settings,
    })
}

/// Read and parse an index file
pub fn read_index(path: &Path) -> Result<IndexFile> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::UnreadableIndex {
        path: path.to_path_buf(),
        source,
    })?;
    parse_index(&text, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<IndexFile> {
        parse_index(text, Path::new("index.txt"))
    }

    #[test]
    fn test_parse_all_line_kinds() {
        let index = parse(
            "# a comment\n\
             \n\
             # set toc_title = Pack\n\
             @ Part one / Background\n\
             a.pdf | 3 | Alpha\n\
             b.PDF\n\
             c.pdf || Gamma | with bar\n\
             # BLANK\n",
        )
        .unwrap();

        assert_eq!(index.settings.len(), 1);
        assert_eq!(index.settings[0].key, "toc_title");
        assert_eq!(index.settings[0].value, "Pack");
        assert_eq!(index.settings[0].line, 3);

        let items: Vec<_> = index.lines.iter().map(|l| l.item.clone()).collect();
        assert_eq!(
            items,
            vec![
                IndexItem::Divider { title: "Part one / Background".to_string() },
                IndexItem::Document {
                    path: PathBuf::from("a.pdf"),
                    pages: Some(3),
                    title: Some("Alpha".to_string()),
                },
                IndexItem::Document {
                    path: PathBuf::from("b.PDF"),
                    pages: None,
                    title: None,
                },
                IndexItem::Document {
                    path: PathBuf::from("c.pdf"),
                    pages: None,
                    title: Some("Gamma | with bar".to_string()),
                },
                IndexItem::Blank,
            ]
        );
        assert_eq!(index.lines[1].line, 5);
        assert_eq!(index.document_count(), 3);
    }

    #[test]
    fn test_stop_ends_processing() {
        let index = parse("a.pdf\n# STOP here\nnot a pdf line\n").unwrap();
        assert_eq!(index.lines.len(), 1);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let err = parse("a.pdf\n\nthis is not a path\n").unwrap_err();
        match err {
            Error::MalformedPlan { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_bad_page_count() {
        assert!(matches!(
            parse("a.pdf | zero").unwrap_err(),
            Error::MalformedPlan { line: 1, .. }
        ));
        assert!(matches!(
            parse("a.pdf | 0").unwrap_err(),
            Error::MalformedPlan { line: 1, .. }
        ));
    }

    #[test]
    fn test_empty_divider_and_bad_setting() {
        assert!(matches!(parse("@   ").unwrap_err(), Error::MalformedPlan { .. }));
        assert!(matches!(parse("# set duplex").unwrap_err(), Error::MalformedPlan { .. }));
    }

    #[test]
    fn test_apply_settings_reports_line() {
        let index = parse("# set toc_rows_per_page = 5\n# set bogus = 1\n").unwrap();
        let mut options = CollateOptions::default();
        let err = index.apply_settings(&mut options).unwrap_err();

        assert_eq!(options.toc_rows_per_page, 5);
        assert!(matches!(err, Error::MalformedPlan { line: 2, .. }));
    }

    #[test]
    fn test_format_round_trips_through_parser() {
        let entries = vec![
            PlanEntry::document("docs/one.pdf", "one", 2),
            PlanEntry::divider("Part two"),
            PlanEntry::document("docs/two.pdf", "Second", 1),
        ];
        let text = format_index(&entries);
        let index = parse(&text).unwrap();

        assert!(index.settings.is_empty());
        assert_eq!(index.lines.len(), 3);
        assert_eq!(
            index.lines[0].item,
            IndexItem::Document {
                path: PathBuf::from("docs/one.pdf"),
                pages: Some(2),
                title: Some("one".to_string()),
            }
        );
    }

    #[test]
    fn test_format_keeps_marker_paths_as_documents() {
        let entries = vec![
            PlanEntry::document("@home.pdf", "@home", 1),
            PlanEntry::document("#3.pdf", "#3", 2),
        ];
        let index = parse(&format_index(&entries)).unwrap();

        assert_eq!(index.lines.len(), 2);
        assert!(matches!(
            &index.lines[0].item,
            IndexItem::Document { path, .. } if path == Path::new("./@home.pdf")
        ));
        assert!(matches!(
            &index.lines[1].item,
            IndexItem::Document { path, pages: Some(2), .. } if path == Path::new("./#3.pdf")
        ));
    }

    #[test]
    fn test_missing_index_file_is_named() {
        let err = read_index(Path::new("no-such-dir/pack.idx")).unwrap_err();

        assert!(matches!(err, Error::UnreadableIndex { .. }));
        assert!(err.to_string().contains("pack.idx"));
    }

    #[test]
    fn test_title_for_uses_file_stem() {
        assert_eq!(title_for(Path::new("samples/docs/3. Lecture notes.pdf")), "3. Lecture notes");
    }

    #[test]
    fn test_build_index_skips_non_pdf_and_fails_on_missing() {
        let entries = build_index(&[PathBuf::from("notes.txt")]).unwrap();
        assert!(entries.is_empty());

        let err = build_index(&[PathBuf::from("definitely-missing.pdf")]).unwrap_err();
        assert!(matches!(err, Error::UnreadableSource { .. }));
    }
}
