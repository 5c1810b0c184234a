//! Page geometry and pagination.

use crate::config::ExportConfig;

/// Points per millimetre
pub const MM_TO_PT: f32 = 72.0 / 25.4;

/// Generated text as an ordered list of rows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    lines: Vec<String>,
}

impl Document {
    /// Split text on line breaks. A trailing `\r` is dropped from each line.
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of rows the document renders to
    pub fn row_count(&self) -> usize {
        self.lines.len()
    }
}

/// Fixed page geometry in millimetres, with one fixed-height row per line
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub page_width_mm: f32,
    pub page_height_mm: f32,
    pub left_margin_mm: f32,
    pub top_margin_mm: f32,
    /// A new page starts when a row would cross this margin
    pub bottom_margin_mm: f32,
    pub row_height_mm: f32,
    /// Standard Type1 font name
    pub font: String,
    pub font_size: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        // A4 portrait
        Self {
            page_width_mm: 210.0,
            page_height_mm: 297.0,
            left_margin_mm: 10.0,
            top_margin_mm: 10.0,
            bottom_margin_mm: 15.0,
            row_height_mm: 10.0,
            font: "Helvetica".to_string(),
            font_size: 12.0,
        }
    }
}

impl PageLayout {
    pub fn from_config(config: &ExportConfig) -> Self {
        Self {
            font: config.font.clone(),
            font_size: config.font_size,
            row_height_mm: config.row_height_mm,
            bottom_margin_mm: config.bottom_margin_mm,
            ..Default::default()
        }
    }

    /// Rows that fit between the top margin and the page-break margin.
    /// At least one row always fits.
    pub fn rows_per_page(&self) -> usize {
        let usable = self.page_height_mm - self.top_margin_mm - self.bottom_margin_mm;
        if self.row_height_mm <= 0.0 || usable <= 0.0 {
            return 1;
        }
        // The epsilon keeps an exact fit from rounding down.
        ((usable / self.row_height_mm) + 1e-4).floor().max(1.0) as usize
    }

    /// Baseline of row `index` on its page, in PDF points from the page bottom.
    ///
    /// Text sits vertically centred in its row.
    pub fn baseline_pt(&self, index: usize) -> f32 {
        let row_top = self.top_margin_mm + self.row_height_mm * index as f32;
        let baseline_from_top =
            row_top * MM_TO_PT + 0.5 * self.row_height_mm * MM_TO_PT + 0.3 * self.font_size;
        self.page_height_mm * MM_TO_PT - baseline_from_top
    }

    pub fn left_pt(&self) -> f32 {
        self.left_margin_mm * MM_TO_PT
    }

    pub fn page_size_pt(&self) -> (f32, f32) {
        (
            self.page_width_mm * MM_TO_PT,
            self.page_height_mm * MM_TO_PT,
        )
    }
}

/// Split rows into pages. An empty row list still yields one (blank) page.
pub fn paginate<'a>(lines: &'a [String], layout: &PageLayout) -> Vec<&'a [String]> {
    if lines.is_empty() {
        return vec![lines];
    }
    lines.chunks(layout.rows_per_page()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("line {}", i)).collect()
    }

    #[test]
    fn test_document_from_text() {
        let doc = Document::from_text("Line1\nLine2\nLine3");
        assert_eq!(doc.row_count(), 3);
        assert_eq!(doc.lines()[1], "Line2");
    }

    #[test]
    fn test_document_keeps_blank_lines() {
        let doc = Document::from_text("a\r\n\r\nb\n");
        assert_eq!(doc.lines(), &["a", "", "b", ""]);
    }

    #[test]
    fn test_document_from_empty_text() {
        assert_eq!(Document::from_text("").row_count(), 1);
    }

    #[test]
    fn test_default_rows_per_page() {
        // (297 - 10 - 15) / 10 = 27.2
        assert_eq!(PageLayout::default().rows_per_page(), 27);
    }

    #[test]
    fn test_rows_per_page_exact_fit() {
        let layout = PageLayout {
            bottom_margin_mm: 17.0,
            ..Default::default()
        };
        assert_eq!(layout.rows_per_page(), 27);
    }

    #[test]
    fn test_rows_per_page_degenerate_layout() {
        let layout = PageLayout {
            row_height_mm: 500.0,
            ..Default::default()
        };
        assert_eq!(layout.rows_per_page(), 1);

        let layout = PageLayout {
            row_height_mm: 0.0,
            ..Default::default()
        };
        assert_eq!(layout.rows_per_page(), 1);
    }

    #[test]
    fn test_paginate() {
        let layout = PageLayout::default();
        let rows = lines(60);
        let pages = paginate(&rows, &layout);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 27);
        assert_eq!(pages[1].len(), 27);
        assert_eq!(pages[2].len(), 6);
        assert_eq!(pages[2][0], "line 54");
    }

    #[test]
    fn test_paginate_exact_page() {
        let layout = PageLayout::default();
        let rows = lines(27);
        assert_eq!(paginate(&rows, &layout).len(), 1);
        let rows = lines(28);
        assert_eq!(paginate(&rows, &layout).len(), 2);
    }

    #[test]
    fn test_paginate_empty() {
        let layout = PageLayout::default();
        let pages = paginate(&[], &layout);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].is_empty());
    }

    #[test]
    fn test_rows_stay_above_bottom_margin() {
        let layout = PageLayout::default();
        let last = layout.baseline_pt(layout.rows_per_page() - 1);
        assert!(last > layout.bottom_margin_mm * MM_TO_PT);
        assert!(layout.baseline_pt(0) > last);
    }

    #[test]
    fn test_layout_from_config() {
        let config = ExportConfig {
            font: "Courier".to_string(),
            font_size: 10.0,
            row_height_mm: 5.0,
            ..Default::default()
        };
        let layout = PageLayout::from_config(&config);
        assert_eq!(layout.font, "Courier");
        assert_eq!(layout.row_height_mm, 5.0);
        assert_eq!(layout.rows_per_page(), 54);
    }
}
