//! Bar charts rendered to PNG
//!
//! Charts carry a title, bars keyed by their labels, axes and a zero baseline.
//! Text needs a TrueType font from the host: `ETL_CHART_FONT` names one
//! explicitly, otherwise a few common system locations are tried. Without a font
//! the chart is still drawn, only without glyphs. Each bar's label and value
//! are logged either way.

use crate::queries::{MonthlyRevenue, ProductRevenue};
use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const CHART_WIDTH: u32 = 1000;
pub const CHART_HEIGHT: u32 = 600;
pub const MONTHLY_REVENUE_FILE: &str = "monthly_revenue.png";
pub const TOP_PRODUCTS_FILE: &str = "top_products.png";

/// Environment variable pointing at a `.ttf`/`.otf` file for chart text
pub const FONT_ENV: &str = "ETL_CHART_FONT";

const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

const MARGIN: u32 = 40;
const TITLE_SCALE: f32 = 20.0;
const LABEL_SCALE: f32 = 12.0;
const MAX_LABEL_CHARS: usize = 36;
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const BAR: Rgb<u8> = Rgb([70, 130, 180]);
const TEXT: Rgb<u8> = Rgb([40, 40, 40]);

/// Parse a font file, `None` if it is missing or not a font
pub fn font_from_path(path: &Path) -> Option<FontVec> {
    let bytes = std::fs::read(path).ok()?;
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("Ignoring chart font {}: {}", path.display(), e);
            None
        }
    }
}

/// The font named by `ETL_CHART_FONT`, else the first system font found
pub fn load_font() -> Option<FontVec> {
    if let Ok(path) = std::env::var(FONT_ENV) {
        return font_from_path(Path::new(&path));
    }
    FONT_CANDIDATES.iter().find_map(|p| {
        let font = font_from_path(Path::new(p))?;
        debug!("Using chart font {}", p);
        Some(font)
    })
}

fn short_label(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let mut cut: String = label.chars().take(MAX_LABEL_CHARS - 1).collect();
        cut.push('…');
        cut
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Bars grow upward from the baseline
    Vertical,
    /// Bars grow rightward from the baseline
    Horizontal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct BarChart {
    pub title: String,
    pub orientation: Orientation,
    pub bars: Vec<Bar>,
}

/// Maps values onto one pixel axis. Zero is always inside the range.
struct ValueScale {
    lo: f64,
    hi: f64,
    start: f64,
    end: f64,
}

impl ValueScale {
    fn new(bars: &[Bar], start: f64, end: f64) -> Self {
        let lo = bars.iter().map(|b| b.value).fold(0.0, f64::min);
        let hi = bars.iter().map(|b| b.value).fold(0.0, f64::max);
        Self { lo, hi, start, end }
    }

    fn pixel(&self, value: f64) -> f64 {
        let span = if self.hi > self.lo { self.hi - self.lo } else { 1.0 };
        self.start + (value - self.lo) / span * (self.end - self.start)
    }
}

fn fill(img: &mut RgbImage, x0: f64, y0: f64, x1: f64, y1: f64) {
    let left = x0.min(x1).round() as i32;
    let top = y0.min(y1).round() as i32;
    let width = ((x1 - x0).abs().round() as u32).max(1);
    let height = ((y1 - y0).abs().round() as u32).max(1);
    draw_filled_rect_mut(img, Rect::at(left, top).of_size(width, height), BAR);
}

impl BarChart {
    pub fn new(title: impl Into<String>, orientation: Orientation, bars: Vec<Bar>) -> Self {
        Self {
            title: title.into(),
            orientation,
            bars,
        }
    }

    /// Left gutter wide enough for the horizontal bar labels
    fn label_gutter(&self, width: u32, font: &FontVec) -> u32 {
        let widest = self
            .bars
            .iter()
            .map(|b| text_size(PxScale::from(LABEL_SCALE), font, &short_label(&b.label)).0)
            .max()
            .unwrap_or(0);
        (widest + 16).clamp(MARGIN.min(width / 4), width / 2)
    }

    /// Draw the chart. `font` enables the title and bar labels.
    pub fn render(&self, width: u32, height: u32, font: Option<&FontVec>) -> RgbImage {
        let mut img = RgbImage::from_pixel(width, height, BACKGROUND);

        let left_margin = match (self.orientation, font) {
            (Orientation::Horizontal, Some(font)) => self.label_gutter(width, font),
            _ => MARGIN.min(width / 4),
        };
        let left = left_margin as f64;
        let right = (width as f64 - MARGIN.min(width / 4) as f64).max(left + 1.0);
        let top = MARGIN.min(height / 4) as f64;
        let bottom = (height as f64 - top).max(top + 1.0);

        let n = self.bars.len().max(1) as f64;
        let label_scale = PxScale::from(LABEL_SCALE);

        match self.orientation {
            Orientation::Vertical => {
                let scale = ValueScale::new(&self.bars, bottom, top);
                let base = scale.pixel(0.0);
                let slot = (right - left) / n;
                for (i, bar) in self.bars.iter().enumerate() {
                    let x0 = left + slot * i as f64 + slot * 0.1;
                    let x1 = x0 + slot * 0.8;
                    fill(&mut img, x0, base, x1, scale.pixel(bar.value));

                    if let Some(font) = font {
                        let label = short_label(&bar.label);
                        let (w, _) = text_size(label_scale, font, &label);
                        let center = left + slot * (i as f64 + 0.5);
                        let x = (center - w as f64 / 2.0).round() as i32;
                        draw_text_mut(&mut img, TEXT, x, bottom as i32 + 6, label_scale, font, &label);
                    }
                }
                draw_line_segment_mut(
                    &mut img,
                    (left as f32, top as f32),
                    (left as f32, bottom as f32),
                    AXIS,
                );
                draw_line_segment_mut(
                    &mut img,
                    (left as f32, base as f32),
                    (right as f32, base as f32),
                    AXIS,
                );
            }
            Orientation::Horizontal => {
                let scale = ValueScale::new(&self.bars, left, right);
                let base = scale.pixel(0.0);
                let slot = (bottom - top) / n;
                // first bar on top
                for (i, bar) in self.bars.iter().enumerate() {
                    let y0 = top + slot * i as f64 + slot * 0.1;
                    let y1 = y0 + slot * 0.8;
                    fill(&mut img, base, y0, scale.pixel(bar.value), y1);

                    if let Some(font) = font {
                        let label = short_label(&bar.label);
                        let (w, h) = text_size(label_scale, font, &label);
                        let center = top + slot * (i as f64 + 0.5);
                        let x = left as i32 - w as i32 - 8;
                        let y = (center - h as f64 / 2.0).round() as i32;
                        draw_text_mut(&mut img, TEXT, x.max(0), y, label_scale, font, &label);
                    }
                }
                draw_line_segment_mut(
                    &mut img,
                    (left as f32, bottom as f32),
                    (right as f32, bottom as f32),
                    AXIS,
                );
                draw_line_segment_mut(
                    &mut img,
                    (base as f32, top as f32),
                    (base as f32, bottom as f32),
                    AXIS,
                );
            }
        }

        if let Some(font) = font {
            let y = ((top - TITLE_SCALE as f64) / 2.0).max(0.0) as i32;
            draw_text_mut(
                &mut img,
                TEXT,
                left as i32,
                y,
                PxScale::from(TITLE_SCALE),
                font,
                &self.title,
            );
        }

        img
    }

    /// Render at the default size and write a PNG, creating the parent directory
    pub fn save(&self, path: &Path, font: Option<&FontVec>) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        if self.bars.is_empty() {
            warn!("Chart '{}' has no data", self.title);
        }
        if font.is_none() {
            warn!("No chart font found (set {}); drawing without text", FONT_ENV);
        }
        info!("{}", self.title);
        for bar in &self.bars {
            info!("  {:<40} {:>14.2}", bar.label, bar.value);
        }

        self.render(CHART_WIDTH, CHART_HEIGHT, font)
            .save(path)
            .with_context(|| format!("Failed to write chart {}", path.display()))?;
        Ok(())
    }
}

/// Vertical bars of revenue per `YYYY-MM`, written to `monthly_revenue.png`
pub fn plot_monthly_revenue(
    rows: &[MonthlyRevenue],
    out_dir: &Path,
    font: Option<&FontVec>,
) -> Result<PathBuf> {
    let bars = rows
        .iter()
        .map(|r| Bar {
            label: r.period(),
            value: r.revenue,
        })
        .collect();
    let out = out_dir.join(MONTHLY_REVENUE_FILE);
    BarChart::new("Monthly Revenue (GBP)", Orientation::Vertical, bars).save(&out, font)?;
    info!("✅ Saved monthly revenue chart to {}", out.display());
    Ok(out)
}

/// Horizontal bars of revenue per product description, written to `top_products.png`
pub fn plot_top_products(
    rows: &[ProductRevenue],
    out_dir: &Path,
    font: Option<&FontVec>,
) -> Result<PathBuf> {
    let bars = rows
        .iter()
        .map(|r| Bar {
            label: r.label().to_string(),
            value: r.revenue,
        })
        .collect();
    let out = out_dir.join(TOP_PRODUCTS_FILE);
    BarChart::new("Top Products by Revenue (GBP)", Orientation::Horizontal, bars)
        .save(&out, font)?;
    info!("✅ Saved top products chart to {}", out.display());
    Ok(out)
}

// =============================================================================
// TESTS
// =============================================================================
