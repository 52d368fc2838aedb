//! Collation settings
//!
//! Settings start from `CollateOptions::default()`, are overridden by
//! `# set key = value` directives in the index file, and finally by
//! command-line flags.

use std::path::PathBuf;
use std::str::FromStr;

use crate::layout::{PageSize, SizePolicy};

/// Which edge of the canvas the overlay bar sits on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlayPosition {
    Top,
    #[default]
    Bottom,
}

impl FromStr for OverlayPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "top" => Ok(OverlayPosition::Top),
            "bottom" => Ok(OverlayPosition::Bottom),
            other => Err(format!("overlay position must be `top` or `bottom`, not `{}`", other)),
        }
    }
}

/// Appearance of the per-page overlay bar
#[derive(Debug, Clone)]
pub struct OverlayStyle {
    /// Text size in points
    pub font_size: f32,
    /// Bar height in points
    pub bar_height: f32,
    /// Distance between the bar and the canvas edge
    pub edge_margin: f32,
    /// Distance between the bar and the left/right canvas edges
    pub side_margin: f32,
    /// Background fill, RGB in 0..=1
    pub background: (f32, f32, f32),
    /// Text colour, RGB in 0..=1
    pub text_color: (f32, f32, f32),
    /// Fill opacity of the background box
    pub opacity: f32,
    pub position: OverlayPosition,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            bar_height: 20.0,
            edge_margin: 14.0,
            side_margin: 43.0,
            background: (0.3, 0.6, 0.9),
            text_color: (0.0, 0.0, 0.0),
            opacity: 0.9,
            position: OverlayPosition::Bottom,
        }
    }
}

/// Options for a `makepdf` run
#[derive(Debug, Clone)]
pub struct CollateOptions {
    /// Canvas size under `SizePolicy::Fixed`
    pub page_size: PageSize,
    pub size_policy: SizePolicy,
    /// Heading on the first TOC page
    pub toc_title: String,
    /// TOC rows per page; at least 1
    pub toc_rows_per_page: usize,
    pub toc_font_size: f32,
    pub divider_font_size: f32,
    pub overlay: OverlayStyle,
    /// Pad so cover, TOC and dividers start on a right-hand page
    pub duplex: bool,
    /// Write a PDF outline mirroring the TOC
    pub bookmarks: bool,
    /// Fail on page counts that disagree with the index instead of warning
    pub verify_sources: bool,
    /// TrueType font to embed instead of Helvetica
    pub font: Option<PathBuf>,
}

impl Default for CollateOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::a4(),
            size_policy: SizePolicy::Max,
            toc_title: "Table of contents".to_string(),
            toc_rows_per_page: 36,
            toc_font_size: 12.0,
            divider_font_size: 24.0,
            overlay: OverlayStyle::default(),
            duplex: false,
            bookmarks: true,
            verify_sources: true,
            font: None,
        }
    }
}

impl CollateOptions {
    /// Apply one `key = value` setting
    ///
    /// Returns a message suitable for an error report when the key is
    /// unknown or the value does not parse.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), String> {
        let value = value.trim();
        match key.trim() {
            "page_size" => self.page_size = value.parse()?,
            "size_policy" => self.size_policy = value.parse()?,
            "toc_title" => self.toc_title = value.to_string(),
            "toc_rows_per_page" => {
                let rows: usize = parse_number(key, value)?;
                if rows == 0 {
                    return Err("toc_rows_per_page must be at least 1".to_string());
                }
                self.toc_rows_per_page = rows;
            }
            "toc_font_size" => self.toc_font_size = parse_font_size(key, value)?,
            "divider_font_size" => self.divider_font_size = parse_font_size(key, value)?,
            "overlay_font_size" => self.overlay.font_size = parse_font_size(key, value)?,
            "overlay_opacity" => {
                let opacity: f32 = parse_number(key, value)?;
                if !(0.0..=1.0).contains(&opacity) {
                    return Err("overlay_opacity must be between 0 and 1".to_string());
                }
                self.overlay.opacity = opacity;
            }
            "overlay_position" => self.overlay.position = value.parse()?,
            "duplex" => self.duplex = parse_bool(key, value)?,
            "bookmarks" => self.bookmarks = parse_bool(key, value)?,
            "verify_sources" => self.verify_sources = parse_bool(key, value)?,
            "font" => self.font = Some(PathBuf::from(value)),
            other => return Err(format!("unknown setting `{}`", other)),
        }
        Ok(())
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("`{}` is not a valid number for {}", value, key.trim()))
}

fn parse_font_size(key: &str, value: &str) -> Result<f32, String> {
    let size: f32 = parse_number(key, value.trim_end_matches("pt"))?;
    if !(size > 0.0 && size.is_finite()) {
        return Err(format!("{} must be positive", key.trim()));
    }
    Ok(size)
}

fn parse_bool(key: &str, value: &str) -> Result<bool, String> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(format!("`{}` is not a valid boolean for {}", value, key.trim())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = CollateOptions::default();
        assert_eq!(options.toc_rows_per_page, 36);
        assert_eq!(options.size_policy, SizePolicy::Max);
        assert_eq!(options.overlay.position, OverlayPosition::Bottom);
        assert!(!options.duplex);
        assert!(options.verify_sources);
    }

    #[test]
    fn test_set_known_keys() {
        let mut options = CollateOptions::default();
        options.set("toc_title", "  Reading pack ").unwrap();
        options.set("toc_rows_per_page", "10").unwrap();
        options.set("duplex", "yes").unwrap();
        options.set("overlay_position", "top").unwrap();
        options.set("page_size", "letter").unwrap();
        options.set("overlay_font_size", "9pt").unwrap();

        assert_eq!(options.toc_title, "Reading pack");
        assert_eq!(options.toc_rows_per_page, 10);
        assert!(options.duplex);
        assert_eq!(options.overlay.position, OverlayPosition::Top);
        assert_eq!(options.page_size, PageSize::letter());
        assert_eq!(options.overlay.font_size, 9.0);
    }

    #[test]
    fn test_set_rejects_bad_values() {
        let mut options = CollateOptions::default();
        assert!(options.set("toc_rows_per_page", "0").is_err());
        assert!(options.set("toc_rows_per_page", "many").is_err());
        assert!(options.set("overlay_opacity", "1.5").is_err());
        assert!(options.set("duplex", "maybe").is_err());
        assert!(options.set("colour", "red").unwrap_err().contains("unknown setting"));
    }
}
