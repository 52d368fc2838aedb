//! collatepdf CLI tool
//!
//! Builds an editable index from a set of PDFs, then collates the indexed
//! PDFs into one document with a table of contents and page numbers.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glob::glob;
use log::{info, warn, LevelFilter};

use pdf_collate::index::{build_index, write_index};
use pdf_collate::paginate::PageSource;
use pdf_collate::pdf::{collate, prepare, CollateJob};
use pdf_collate::Error;

/// collatepdf - Collate PDFs with a table of contents and page numbers
#[derive(Parser)]
#[command(name = "collatepdf")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    # Index every PDF in a folder, in name order
    collatepdf makeindex -o pack.idx \"papers/*.pdf\"

    # Edit pack.idx (reorder lines, add `@ Part one` dividers), then
    collatepdf makepdf pack.idx -c cover.pdf -o pack.pdf

    # Check the numbering without writing anything
    collatepdf makepdf pack.idx -o pack.pdf --dry-run")]
struct Cli {
    /// Log every page as it is composited
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an index file listing PDFs and their page counts
    Makeindex {
        /// Input PDF files (in order). Supports glob patterns like "*.pdf"
        #[arg(required = true)]
        inputs: Vec<String>,

        /// Index file to write
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Collate the PDFs listed in an index file into one PDF
    Makepdf {
        /// Index file, as written by makeindex and possibly hand edited
        index: PathBuf,

        /// PDF placed unchanged before the table of contents
        #[arg(short, long)]
        cover: Option<PathBuf>,

        /// Output PDF file path
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        settings: SettingArgs,

        /// Print the page plan instead of writing the PDF
        #[arg(long)]
        dry_run: bool,

        /// Open the output file after creation
        #[arg(long)]
        open: bool,
    },
}

/// Flags that override `# set` directives in the index file
#[derive(Args, Debug, Default)]
struct SettingArgs {
    /// TrueType font for TOC, divider and overlay text (default: Helvetica)
    #[arg(short, long)]
    font: Option<PathBuf>,

    /// Pad so the TOC and every divider start on a right-hand page
    #[arg(short, long)]
    duplex: bool,

    /// Canvas size for `--size-policy fixed`: a4, letter, or e.g. 210x297mm
    #[arg(long)]
    page_size: Option<String>,

    /// How the canvas size is chosen: max, most-common, first or fixed
    #[arg(long)]
    size_policy: Option<String>,

    /// Heading of the table of contents
    #[arg(long)]
    toc_title: Option<String>,

    /// TOC rows per page
    #[arg(long)]
    rows_per_page: Option<String>,

    /// Put the page-number bar at the top or bottom of each page
    #[arg(long)]
    overlay_position: Option<String>,

    /// Do not write PDF bookmarks
    #[arg(long)]
    no_bookmarks: bool,

    /// Warn about stale page counts in the index instead of failing
    #[arg(long)]
    allow_stale: bool,

    /// Any other setting, as key=value (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,
}

impl SettingArgs {
    /// The flags as `key = value` settings, in the order they apply
    fn overrides(self) -> Result<Vec<(String, String)>, Error> {
        let mut overrides = Vec::new();
        let mut push = |key: &str, value: String| overrides.push((key.to_string(), value));

        if let Some(font) = self.font {
            push("font", font.display().to_string());
        }
        if self.duplex {
            push("duplex", "true".to_string());
        }
        if let Some(v) = self.page_size {
            push("page_size", v);
        }
        if let Some(v) = self.size_policy {
            push("size_policy", v);
        }
        if let Some(v) = self.toc_title {
            push("toc_title", v);
        }
        if let Some(v) = self.rows_per_page {
            push("toc_rows_per_page", v);
        }
        if let Some(v) = self.overlay_position {
            push("overlay_position", v);
        }
        if self.no_bookmarks {
            push("bookmarks", "false".to_string());
        }
        if self.allow_stale {
            push("verify_sources", "false".to_string());
        }
        for setting in self.set {
            let (key, value) = setting
                .split_once('=')
                .ok_or_else(|| {
                    Error::InvalidOption(format!("expected KEY=VALUE, got `{}`", setting))
                })?;
            push(key.trim(), value.trim().to_string());
        }

        Ok(overrides)
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let result = match cli.command {
        Commands::Makeindex { inputs, output } => cmd_makeindex(inputs, output),
        Commands::Makepdf {
            index,
            cover,
            output,
            settings,
            dry_run,
            open,
        } => cmd_makepdf(index, cover, output, settings, dry_run, open),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

/// Expand glob patterns in input paths
///
/// Matches of one pattern are sorted by name; the patterns themselves
/// keep the order they were given in.
fn expand_globs(patterns: Vec<String>) -> Result<Vec<PathBuf>, Error> {
    let mut paths = Vec::new();

    for pattern in patterns {
        // Check if pattern contains glob characters
        if pattern.contains('*') || pattern.contains('?') || pattern.contains('[') {
            let entries =
                glob(&pattern).map_err(|e| Error::InvalidGlob(format!("{}: {}", pattern, e)))?;
            let mut matched = Vec::new();
            for entry in entries {
                match entry {
                    Ok(path) => matched.push(path),
                    Err(e) => warn!("glob error for {}: {}", pattern, e),
                }
            }
            if matched.is_empty() {
                return Err(Error::NoFilesMatched(pattern));
            }
            matched.sort();
            paths.extend(matched);
        } else {
            // No glob characters, treat as literal path
            paths.push(PathBuf::from(pattern));
        }
    }

    Ok(paths)
}

/// Open a file with the system default application
fn open_file(path: &Path) -> anyhow::Result<()> {
    #[cfg(target_os = "macos")]
    {
        process::Command::new("open").arg(path).spawn()?;
    }
    #[cfg(target_os = "linux")]
    {
        process::Command::new("xdg-open").arg(path).spawn()?;
    }
    #[cfg(target_os = "windows")]
    {
        process::Command::new("cmd")
            .args(["/C", "start", "", &path.display().to_string()])
            .spawn()?;
    }
    Ok(())
}

/// Write an index for the given PDFs
fn cmd_makeindex(inputs: Vec<String>, output: PathBuf) -> anyhow::Result<()> {
    let paths = expand_globs(inputs)?;
    info!("Indexing {} file(s)", paths.len());

    let entries = build_index(&paths)?;
    if entries.is_empty() {
        return Err(Error::EmptyDocumentSet.into());
    }
    write_index(&entries, &output)
        .with_context(|| format!("writing index {}", output.display()))?;

    let pages: usize = entries.iter().map(|e| e.page_count).sum();
    info!(
        "Wrote {} ({} documents, {} pages)",
        output.display(),
        entries.len(),
        pages
    );
    Ok(())
}

/// Collate an index into one PDF
fn cmd_makepdf(
    index: PathBuf,
    cover: Option<PathBuf>,
    output: PathBuf,
    settings: SettingArgs,
    dry_run: bool,
    open: bool,
) -> anyhow::Result<()> {
    let mut job = CollateJob::new(index, output);
    job.cover_path = cover;
    job.overrides = settings.overrides()?;

    if dry_run {
        let (plan, _sources) = prepare(&job)?;
        println!("Canvas: {}", plan.geometry.canvas);
        println!("TOC pages: {}", plan.pagination.toc_pages);
        for record in &plan.pagination.records {
            let what = match record.source {
                PageSource::Document { page_index, .. } => {
                    format!("{} (page {})", record.source_label, page_index + 1)
                }
                PageSource::Divider { .. } => format!("divider: {}", record.source_label),
                PageSource::Blank { .. } => "blank".to_string(),
            };
            println!("{:>5}  {}", record.number_text(), what);
        }
        return Ok(());
    }

    let summary = collate(&job)?;
    info!(
        "{} pages: {} cover, {} TOC, {} numbered on a {} canvas",
        summary.total_pages,
        summary.cover_pages,
        summary.toc_pages,
        summary.body_pages,
        summary.canvas,
    );

    if open {
        open_file(&job.output_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_globs_literal_paths_keep_order() {
        let paths = expand_globs(vec!["b.pdf".to_string(), "a.pdf".to_string()]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("b.pdf"), PathBuf::from("a.pdf")]);
    }

    #[test]
    fn test_expand_globs_no_match() {
        let result = expand_globs(vec!["/nonexistent-dir-xyz/*.pdf".to_string()]);
        assert!(matches!(result, Err(Error::NoFilesMatched(_))));
    }

    #[test]
    fn test_setting_flags_become_overrides() {
        let args = SettingArgs {
            duplex: true,
            rows_per_page: Some("20".to_string()),
            no_bookmarks: true,
            set: vec!["overlay_opacity = 0.5".to_string()],
            ..SettingArgs::default()
        };
        let overrides = args.overrides().unwrap();

        assert!(overrides.contains(&("duplex".to_string(), "true".to_string())));
        assert!(overrides.contains(&("toc_rows_per_page".to_string(), "20".to_string())));
        assert!(overrides.contains(&("bookmarks".to_string(), "false".to_string())));
        assert_eq!(overrides.last().unwrap(), &("overlay_opacity".to_string(), "0.5".to_string()));
    }

    #[test]
    fn test_bad_set_flag() {
        let args = SettingArgs {
            set: vec!["duplex".to_string()],
            ..SettingArgs::default()
        };
        assert!(matches!(args.overrides(), Err(Error::InvalidOption(_))));
    }

    #[test]
    fn test_cli_parses_makepdf() {
        let cli = Cli::try_parse_from([
            "collatepdf",
            "makepdf",
            "pack.idx",
            "-c",
            "cover.pdf",
            "-o",
            "out.pdf",
            "--rows-per-page",
            "10",
        ])
        .unwrap();
        match cli.command {
            Commands::Makepdf { index, cover, output, settings, .. } => {
                assert_eq!(index, PathBuf::from("pack.idx"));
                assert_eq!(cover, Some(PathBuf::from("cover.pdf")));
                assert_eq!(output, PathBuf::from("out.pdf"));
                assert_eq!(settings.rows_per_page.as_deref(), Some("10"));
            }
            _ => panic!("expected makepdf"),
        }
    }
}
