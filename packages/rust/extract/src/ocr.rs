//! Image extraction: OCR plus line-wrap repair into a synthetic grid.

use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use budgetlens_shared::{BudgetLensError, OcrConfig, Result};
use image::{GrayImage, ImageFormat};
use regex::Regex;
use uuid::Uuid;

use crate::grid::ExtractionGrid;

/// Leading tokens that mark a labeled outline row: `1`, `2.6.1`, `A`, `IV`,
/// optionally followed by `.` or `)`.
static LABEL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)*|[A-ZĐ]|[IVXLC]+)[.)]?$").expect("valid regex")
});

/// Turns image bytes into raw text lines.
///
/// Implementations are blocking; callers run them on a blocking thread.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String>;
}

/// [`TextRecognizer`] backed by the `tesseract` command-line tool.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    config: OcrConfig,
}

impl TesseractOcr {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl TextRecognizer for TesseractOcr {
    fn recognize(&self, image_bytes: &[u8]) -> Result<String> {
        let prepared = preprocess(image_bytes, self.config.binarize_threshold)?;

        let path = std::env::temp_dir().join(format!("budgetlens_ocr_{}.png", Uuid::now_v7()));
        prepared
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| BudgetLensError::extraction(format!("failed to write OCR input: {e}")))?;
        let _cleanup = TempFile(path.clone());

        let psm = self.config.page_seg_mode.to_string();
        let output = Command::new(&self.config.tesseract_cmd)
            .arg(&path)
            .arg("stdout")
            .args(["-l", &self.config.language, "--oem", "3", "--psm", &psm])
            .output()
            .map_err(|e| {
                BudgetLensError::extraction(format!(
                    "failed to run {}: {e}",
                    self.config.tesseract_cmd
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BudgetLensError::extraction(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Removes the wrapped path when dropped.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

/// Ink runs at least this long, in pixels, are table rules rather than text.
/// Equivalent to opening twice with a 40-pixel line kernel.
const RULE_MIN_RUN: u32 = 79;

/// Decode, convert to grayscale, binarize at `threshold`, and erase table
/// grid lines.
pub fn preprocess(image_bytes: &[u8], threshold: u8) -> Result<GrayImage> {
    let decoded = image::load_from_memory(image_bytes)
        .map_err(|e| BudgetLensError::extraction(format!("failed to decode image: {e}")))?;

    let mut gray = decoded.to_luma8();
    for pixel in gray.pixels_mut() {
        pixel.0[0] = if pixel.0[0] > threshold { 255 } else { 0 };
    }
    remove_rules(&mut gray, RULE_MIN_RUN);
    Ok(gray)
}

/// Whiten every horizontal or vertical ink run of at least `min_run` pixels.
///
/// Both directions are detected on the binarized input before anything is
/// erased, so a cell corner does not shorten the crossing rule.
fn remove_rules(gray: &mut GrayImage, min_run: u32) {
    let (width, height) = gray.dimensions();
    let ink = |img: &GrayImage, x: u32, y: u32| img.get_pixel(x, y).0[0] == 0;
    let index = |x: u32, y: u32| y as usize * width as usize + x as usize;
    let mut rule = vec![false; width as usize * height as usize];
    let image: &GrayImage = gray;

    for y in 0..height {
        let mut x = 0;
        while x < width {
            let start = x;
            while x < width && ink(image, x, y) {
                x += 1;
            }
            if x - start >= min_run {
                (start..x).for_each(|rx| rule[index(rx, y)] = true);
            }
            x += 1;
        }
    }
    for x in 0..width {
        let mut y = 0;
        while y < height {
            let start = y;
            while y < height && ink(image, x, y) {
                y += 1;
            }
            if y - start >= min_run {
                (start..y).for_each(|ry| rule[index(x, ry)] = true);
            }
            y += 1;
        }
    }

    let erased = rule.iter().filter(|r| **r).count();
    for (pixel, is_rule) in gray.pixels_mut().zip(&rule) {
        if *is_rule {
            pixel.0[0] = 255;
        }
    }
    tracing::trace!(erased, "table rules removed");
}

/// Join wrapped lines: a line starting with a lowercase letter continues the
/// previous line instead of starting a new row.
pub fn repair_lines(text: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let continues = line.chars().next().is_some_and(char::is_lowercase);
        match lines.last_mut() {
            Some(prev) if continues => {
                prev.push(' ');
                prev.push_str(line);
            }
            _ => lines.push(line.to_string()),
        }
    }
    lines
}

/// Build a `(label, content)` grid from repaired lines.
///
/// Rows whose leading token is an outline label keep it in the first column;
/// every other row is plain content with an empty label.
pub fn synthetic_grid(lines: &[String]) -> ExtractionGrid {
    let rows = lines
        .iter()
        .map(|line| {
            let (head, rest) = line
                .split_once(char::is_whitespace)
                .unwrap_or((line.as_str(), ""));
            if LABEL_TOKEN.is_match(head) && !rest.trim().is_empty() {
                vec![head.to_string(), rest.trim().to_string()]
            } else {
                vec![String::new(), line.clone()]
            }
        })
        .collect();
    ExtractionGrid::new(rows)
}

/// Recognize an image and build its grid.
pub fn extract_image(image_bytes: &[u8], recognizer: &dyn TextRecognizer) -> Result<ExtractionGrid> {
    let text = recognizer.recognize(image_bytes)?;
    let lines = repair_lines(&text);
    tracing::debug!(lines = lines.len(), "OCR lines after wrap repair");
    Ok(synthetic_grid(&lines))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedText(&'static str);

    impl TextRecognizer for CannedText {
        fn recognize(&self, _image_bytes: &[u8]) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn lowercase_lines_continue_previous() {
        let lines = repair_lines(
            "1. Chi sự nghiệp giáo dục\nvà đào tạo\n\n2. Chi sự nghiệp y tế\n",
        );
        assert_eq!(
            lines,
            vec!["1. Chi sự nghiệp giáo dục và đào tạo", "2. Chi sự nghiệp y tế"]
        );
    }

    #[test]
    fn leading_lowercase_line_is_kept() {
        assert_eq!(repair_lines("tiếp theo\nMục mới"), vec!["tiếp theo", "Mục mới"]);
    }

    #[test]
    fn synthetic_grid_splits_label_markers() {
        let lines: Vec<String> = ["II. Chi thường xuyên", "2.6 Chi bảo vệ môi trường", "Chi khác"]
            .into_iter()
            .map(String::from)
            .collect();
        let grid = synthetic_grid(&lines);
        assert_eq!(grid.rows()[0], vec!["II.", "Chi thường xuyên"]);
        assert_eq!(grid.rows()[1], vec!["2.6", "Chi bảo vệ môi trường"]);
        assert_eq!(grid.rows()[2], vec!["", "Chi khác"]);
    }

    #[test]
    fn extract_image_uses_recognizer() {
        let recognizer = CannedText("A Chi đầu tư phát triển\ncho các xã\n");
        let grid = extract_image(b"ignored", &recognizer).expect("grid");
        assert_eq!(grid.rows().len(), 1);
        assert_eq!(grid.cell(0, 1), "Chi đầu tư phát triển cho các xã");
    }

    #[test]
    fn preprocess_binarizes() {
        let mut img = GrayImage::new(2, 1);
        img.put_pixel(0, 0, image::Luma([40]));
        img.put_pixel(1, 0, image::Luma([200]));
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode");

        let out = preprocess(&png, 150).expect("preprocess");
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(out.get_pixel(1, 0).0[0], 255);
    }

    #[test]
    fn grid_lines_are_erased_but_text_strokes_stay() {
        let mut img = GrayImage::from_pixel(120, 100, image::Luma([255]));
        for x in 0..120 {
            img.put_pixel(x, 50, image::Luma([0]));
        }
        for y in 0..100 {
            img.put_pixel(110, y, image::Luma([0]));
        }
        for x in 10..18 {
            img.put_pixel(x, 20, image::Luma([0]));
        }
        for y in 30..45 {
            img.put_pixel(30, y, image::Luma([0]));
        }
        let mut png = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
            .expect("encode");

        let out = preprocess(&png, 150).expect("preprocess");
        assert_eq!(out.get_pixel(60, 50).0[0], 255);
        assert_eq!(out.get_pixel(110, 10).0[0], 255);
        assert_eq!(out.get_pixel(110, 50).0[0], 255);
        assert_eq!(out.get_pixel(12, 20).0[0], 0);
        assert_eq!(out.get_pixel(30, 40).0[0], 0);
    }

    #[test]
    fn undecodable_image_is_extraction_error() {
        let err = preprocess(b"garbage", 150).unwrap_err();
        assert!(matches!(err, BudgetLensError::Extraction { .. }));
    }
}
