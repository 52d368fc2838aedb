//! Page geometry: choosing one canvas for every body page and fitting
//! each source page onto it
//!
//! All lengths are PDF points (1/72 inch). The coordinate system has its
//! origin at the bottom-left of the page.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Points per millimetre
const PT_PER_MM: f32 = 72.0 / 25.4;

/// Page dimensions in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Create a page size from millimetres
    pub fn from_mm(width: f32, height: f32) -> Self {
        Self::new(width * PT_PER_MM, height * PT_PER_MM)
    }

    /// A4 size (210mm × 297mm)
    pub fn a4() -> Self {
        Self::from_mm(210.0, 297.0)
    }

    /// US Letter size (8.5" × 11")
    pub fn letter() -> Self {
        Self::new(612.0, 792.0)
    }

    /// Both dimensions strictly positive and finite
    pub fn is_valid(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    /// Whole-point key used to group nearly identical sizes
    fn rounded(&self) -> (i64, i64) {
        (self.width.round() as i64, self.height.round() as i64)
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}x{:.1}pt", self.width, self.height)
    }
}

/// Accepts `a3`, `a4`, `a5`, `letter`, `legal`, or `WxH` with an optional
/// `mm`/`in`/`pt` suffix (points when omitted).
impl FromStr for PageSize {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        let named = match s.as_str() {
            "a3" => Some(Self::from_mm(297.0, 420.0)),
            "a4" => Some(Self::a4()),
            "a5" => Some(Self::from_mm(148.0, 210.0)),
            "letter" => Some(Self::letter()),
            "legal" => Some(Self::new(612.0, 1008.0)),
            _ => None,
        };
        if let Some(size) = named {
            return Ok(size);
        }

        let (dims, factor) = if let Some(d) = s.strip_suffix("mm") {
            (d, PT_PER_MM)
        } else if let Some(d) = s.strip_suffix("in") {
            (d, 72.0)
        } else {
            (s.strip_suffix("pt").unwrap_or(&s), 1.0)
        };

        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| format!("unknown page size `{}`", s))?;
        let parse = |v: &str| {
            v.trim()
                .parse::<f32>()
                .map_err(|_| format!("bad page dimension `{}`", v.trim()))
        };
        let size = Self::new(parse(w)? * factor, parse(h)? * factor);
        if !size.is_valid() {
            return Err(format!("page size must be positive: `{}`", s));
        }
        Ok(size)
    }
}

/// How the shared canvas size is picked from the body pages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SizePolicy {
    /// Widest width and tallest height seen; every page fits with scale <= 1
    #[default]
    Max,
    /// The size shared by the most pages (first seen wins a tie)
    MostCommon,
    /// The size of the first body page
    First,
    /// The configured page size, whatever the sources are
    Fixed,
}

impl FromStr for SizePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "max" => Ok(SizePolicy::Max),
            "most-common" | "most_common" | "common" => Ok(SizePolicy::MostCommon),
            "first" => Ok(SizePolicy::First),
            "fixed" => Ok(SizePolicy::Fixed),
            other => Err(format!("unknown size policy `{}`", other)),
        }
    }
}

/// Uniform scale plus offset placing a source page on the canvas
///
/// A source point `(x, y)`, measured from the source page's lower-left
/// corner, lands at `(x * scale + x_offset, y * scale + y_offset)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub scale: f32,
    pub x_offset: f32,
    pub y_offset: f32,
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

/// Scale `src` uniformly to fit inside `canvas` and centre it
///
/// Pages are only ever shrunk; a page smaller than the canvas keeps its
/// natural size and is centred.
pub fn fit(src: PageSize, canvas: PageSize) -> Transform {
    let scale = (canvas.width / src.width)
        .min(canvas.height / src.height)
        .min(1.0);
    Transform {
        scale,
        x_offset: (canvas.width - src.width * scale) / 2.0,
        y_offset: (canvas.height - src.height * scale) / 2.0,
    }
}

/// The canvas shared by every body page, and one transform per source page
#[derive(Debug, Clone)]
pub struct TargetGeometry {
    pub canvas: PageSize,
    pub transforms: Vec<Transform>,
}

impl TargetGeometry {
    /// Transform for the `index`-th source page, in the order given to `normalize`
    pub fn transform(&self, index: usize) -> Option<Transform> {
        self.transforms.get(index).copied()
    }
}

/// Pick the canvas size for a set of body pages
pub fn choose_canvas(pages: &[PageSize], policy: SizePolicy, fixed: PageSize) -> Result<PageSize> {
    let first = *pages.first().ok_or(Error::EmptyDocumentSet)?;

    let canvas = match policy {
        SizePolicy::Max => pages.iter().fold(first, |acc, p| {
            PageSize::new(acc.width.max(p.width), acc.height.max(p.height))
        }),
        SizePolicy::MostCommon => {
            let mut counts: HashMap<(i64, i64), usize> = HashMap::new();
            for page in pages {
                *counts.entry(page.rounded()).or_default() += 1;
            }
            let best = counts.values().copied().max().unwrap_or(0);
            pages
                .iter()
                .copied()
                .find(|p| counts[&p.rounded()] == best)
                .unwrap_or(first)
        }
        SizePolicy::First => first,
        SizePolicy::Fixed => fixed,
    };

    Ok(canvas)
}

/// Compute the target geometry for the ordered body pages
///
/// Fails with `EmptyDocumentSet` when there is nothing to size from.
pub fn normalize(
    pages: &[PageSize],
    policy: SizePolicy,
    fixed: PageSize,
) -> Result<TargetGeometry> {
    let canvas = choose_canvas(pages, policy, fixed)?;
    let transforms = pages.iter().map(|&p| fit(p, canvas)).collect();
    Ok(TargetGeometry { canvas, transforms })
}

/// Margins for generated page content, in points
#[derive(Debug, Clone, Copy)]
pub struct Margins {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Margins {
    /// Create margins with same value on all sides
    pub fn uniform(margin: f32) -> Self {
        Self {
            top: margin,
            bottom: margin,
            left: margin,
            right: margin,
        }
    }

    /// Standard 1-inch margins on all sides
    pub fn standard() -> Self {
        Self::uniform(72.0)
    }

    /// Width left between the side margins
    pub fn inner_width(&self, page: PageSize) -> f32 {
        (page.width - self.left - self.right).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn test_a4_size() {
        let a4 = PageSize::a4();
        assert!(close(a4.width, 595.28));
        assert!(close(a4.height, 841.89));
    }

    #[test]
    fn test_parse_page_sizes() {
        assert_eq!("letter".parse::<PageSize>().unwrap(), PageSize::letter());
        assert_eq!("612x792".parse::<PageSize>().unwrap(), PageSize::letter());
        let inches: PageSize = "8.5x11in".parse().unwrap();
        assert!(close(inches.width, 612.0) && close(inches.height, 792.0));
        let mm: PageSize = "210x297mm".parse().unwrap();
        assert!(close(mm.width, PageSize::a4().width));
        assert!("0x10".parse::<PageSize>().is_err());
        assert!("huge".parse::<PageSize>().is_err());
    }

    #[test]
    fn test_max_policy_never_upscales() {
        let pages = [
            PageSize::letter(),
            PageSize::a4(),
            PageSize::new(300.0, 200.0),
        ];
        let geometry = normalize(&pages, SizePolicy::Max, PageSize::a4()).unwrap();

        assert!(close(geometry.canvas.width, 612.0));
        assert!(close(geometry.canvas.height, 841.89));
        for t in &geometry.transforms {
            assert!(t.scale <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_fit_is_uniform_and_centered() {
        let canvas = PageSize::new(600.0, 800.0);
        let t = fit(PageSize::new(1200.0, 800.0), canvas);

        assert!(close(t.scale, 0.5));
        assert!(close(t.x_offset, 0.0));
        // 400pt tall once scaled, so 200pt of letterbox above and below
        assert!(close(t.y_offset, 200.0));
    }

    #[test]
    fn test_small_page_is_centred_at_natural_size() {
        let t = fit(PageSize::new(300.0, 200.0), PageSize::letter());

        assert_eq!(t.scale, 1.0);
        assert!(close(t.x_offset, 156.0));
        assert!(close(t.y_offset, 296.0));
    }

    #[test]
    fn test_identical_page_is_identity() {
        let t = fit(PageSize::letter(), PageSize::letter());
        assert_eq!(t, Transform::identity());
    }

    #[test]
    fn test_most_common_policy() {
        let pages = [
            PageSize::a4(),
            PageSize::letter(),
            PageSize::letter(),
            PageSize::new(1000.0, 1000.0),
        ];
        let canvas = choose_canvas(&pages, SizePolicy::MostCommon, PageSize::a4()).unwrap();
        assert_eq!(canvas, PageSize::letter());

        // Oversized pages are shrunk to fit the common size
        let geometry = normalize(&pages, SizePolicy::MostCommon, PageSize::a4()).unwrap();
        assert!(geometry.transform(3).unwrap().scale < 1.0);
    }

    #[test]
    fn test_first_and_fixed_policies() {
        let pages = [PageSize::new(400.0, 400.0), PageSize::letter()];
        assert_eq!(
            choose_canvas(&pages, SizePolicy::First, PageSize::a4()).unwrap(),
            PageSize::new(400.0, 400.0)
        );
        assert_eq!(
            choose_canvas(&pages, SizePolicy::Fixed, PageSize::a4()).unwrap(),
            PageSize::a4()
        );
    }

    #[test]
    fn test_empty_input_fails() {
        let result = normalize(&[], SizePolicy::Max, PageSize::a4());
        assert!(matches!(result, Err(Error::EmptyDocumentSet)));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("most-common".parse::<SizePolicy>().unwrap(), SizePolicy::MostCommon);
        assert_eq!("MAX".parse::<SizePolicy>().unwrap(), SizePolicy::Max);
        assert!("biggest".parse::<SizePolicy>().is_err());
    }

    #[test]
    fn test_standard_margins() {
        let margins = Margins::standard();
        assert_eq!(margins.top, 72.0);
        assert_eq!(margins.inner_width(PageSize::letter()), 468.0);
    }
}
