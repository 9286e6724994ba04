//! Log-scale histograms of recorded error values.
//!
//! Values are binned by decade (`floor(log10(v))`); exact zeros, which have no
//! logarithm, are counted separately.

use std::fs;
use std::io::Write;
use std::path::PathBuf;

use axf_core::errors::{AxfError, ErrorInfo};

fn render_error(code: &str, err: impl ToString) -> AxfError {
    AxfError::Serde(ErrorInfo::new(code, err.to_string()))
}

/// Consumer of per-top error distributions. Purely observational.
pub trait Visualizer {
    /// Renders the recorded errors of the direct pieces of top-level `top`.
    fn render(&mut self, top: usize, tag: Option<&str>, values: &[f64]) -> Result<(), AxfError>;
}

/// Decade-binned counts.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LogHistogram {
    /// Number of exact zeros.
    pub zeros: usize,
    /// Contiguous `(decade, count)` pairs from the smallest to the largest decade seen.
    pub decades: Vec<(i32, usize)>,
}

impl LogHistogram {
    /// Bins `values`; negative or non-finite entries are ignored.
    pub fn from_values(values: &[f64]) -> Self {
        let mut zeros = 0;
        let mut exponents = Vec::with_capacity(values.len());
        for value in values {
            if *value == 0.0 {
                zeros += 1;
            } else if value.is_finite() && *value > 0.0 {
                exponents.push(value.log10().floor() as i32);
            }
        }
        let (Some(lo), Some(hi)) = (exponents.iter().min(), exponents.iter().max()) else {
            return Self {
                zeros,
                decades: Vec::new(),
            };
        };
        let mut decades: Vec<(i32, usize)> = (*lo..=*hi).map(|decade| (decade, 0)).collect();
        for exponent in &exponents {
            decades[(exponent - lo) as usize].1 += 1;
        }
        Self { zeros, decades }
    }

    /// Total number of binned values.
    pub fn total(&self) -> usize {
        self.zeros + self.decades.iter().map(|(_, count)| count).sum::<usize>()
    }

    fn max_count(&self) -> usize {
        self.decades
            .iter()
            .map(|(_, count)| *count)
            .chain(std::iter::once(self.zeros))
            .max()
            .unwrap_or(0)
    }
}

fn heading(top: usize, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!("top[{top}] ({tag})"),
        None => format!("top[{top}]"),
    }
}

/// Prints an ASCII histogram per top-level to a writer.
pub struct TextHistogram<W: Write> {
    out: W,
    width: usize,
}

impl<W: Write> TextHistogram<W> {
    /// Histogram printer with bars at most 40 characters wide.
    pub fn new(out: W) -> Self {
        Self { out, width: 40 }
    }

    /// Consumes the printer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Visualizer for TextHistogram<W> {
    fn render(&mut self, top: usize, tag: Option<&str>, values: &[f64]) -> Result<(), AxfError> {
        let hist = LogHistogram::from_values(values);
        let max = hist.max_count().max(1);
        let bar = |count: usize| "#".repeat((count * self.width).div_ceil(max));
        let mut text = format!(
            "error histogram for {} ({} values)\n",
            heading(top, tag),
            hist.total()
        );
        if hist.zeros > 0 {
            text.push_str(&format!("  {:>14} | {} {}\n", "0", bar(hist.zeros), hist.zeros));
        }
        for (decade, count) in &hist.decades {
            text.push_str(&format!(
                "  {:>14} | {} {}\n",
                format!("[1e{decade}, 1e{})", decade + 1),
                bar(*count),
                count
            ));
        }
        self.out
            .write_all(text.as_bytes())
            .map_err(|err| render_error("histogram_write", err))
    }
}

/// Canvas of a rendered SVG histogram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for SvgConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 240,
        }
    }
}

/// Renders `values` as an SVG bar chart with one bar per decade.
pub fn render_histogram_svg(values: &[f64], config: &SvgConfig) -> String {
    let hist = LogHistogram::from_values(values);
    let mut parts = vec![format!(
        "<svg xmlns='http://www.w3.org/2000/svg' width='{w}' height='{h}'>",
        w = config.width,
        h = config.height
    )];
    let mut bins: Vec<(String, usize)> = Vec::with_capacity(hist.decades.len() + 1);
    if hist.zeros > 0 {
        bins.push(("0".to_string(), hist.zeros));
    }
    bins.extend(
        hist.decades
            .iter()
            .map(|(decade, count)| (format!("1e{decade}"), *count)),
    );
    if !bins.is_empty() {
        let max_bin = hist.max_count().max(1) as f64;
        let bar_width = config.width as f64 / bins.len() as f64;
        for (idx, (label, count)) in bins.iter().enumerate() {
            let height = (*count as f64 / max_bin) * config.height as f64;
            let x = bar_width * idx as f64;
            let y = config.height as f64 - height;
            parts.push(format!(
                "<rect x='{:.2}' y='{:.2}' width='{:.2}' height='{:.2}' fill='#3b82f6'><title>{} : {}</title></rect>",
                x,
                y,
                bar_width.max(1.0),
                height,
                label,
                count
            ));
        }
    }
    parts.push("</svg>".into());
    parts.join("")
}

/// Writes `hist_top<N>.svg` files into a directory.
#[derive(Debug, Clone)]
pub struct SvgHistogram {
    dir: PathBuf,
    config: SvgConfig,
}

impl SvgHistogram {
    /// Writer targeting `dir`, created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: SvgConfig::default(),
        }
    }

    /// Overrides the canvas size.
    pub fn with_config(mut self, config: SvgConfig) -> Self {
        self.config = config;
        self
    }

    /// Path written for top-level `top`.
    pub fn path_for(&self, top: usize) -> PathBuf {
        self.dir.join(format!("hist_top{top}.svg"))
    }
}

impl Visualizer for SvgHistogram {
    fn render(&mut self, top: usize, _tag: Option<&str>, values: &[f64]) -> Result<(), AxfError> {
        fs::create_dir_all(&self.dir).map_err(|err| render_error("histogram_dir", err))?;
        let svg = render_histogram_svg(values, &self.config);
        fs::write(self.path_for(top), svg).map_err(|err| render_error("histogram_write", err))
    }
}
