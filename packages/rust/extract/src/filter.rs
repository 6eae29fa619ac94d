//! Noise removal for selected candidates.
//!
//! Each rule is an independent disqualifier; an item matching any of them is
//! dropped unchanged.

use std::collections::HashSet;
use std::sync::LazyLock;

use budgetlens_shared::{FiltersConfig, Item};
use regex::Regex;

/// Lowercase prefixes marking boilerplate cells: unit headers, totals,
/// administrative-boundary words, row-number headers.
pub const NOISE_KEYWORDS: &[&str] = &[
    "unnamed",
    "phụ biểu",
    "tạm tính",
    "đơn vị tính",
    "xã",
    "huyện",
    "tỉnh",
    "quận",
    "tổng cộng",
    "tổng số",
    "stt",
];

/// Structural headings dropped on exact, case-insensitive match.
pub const HEADING_PHRASES: &[&str] = &[
    "chỉ tiêu",
    "nội dung",
    "nhiệm vụ",
    "tổng số",
    "dự toán chi",
    "chỉ tiêu xác định dự toán",
    "gồm",
    "gồm:",
    "nhiệm vụ ctx",
    "indicator",
    "content",
    "task",
    "total",
];

/// Lowercase prefixes of unit-label lines.
pub const UNIT_PREFIXES: &[&str] = &["đơn vị tính:", "đvt:", "unit:"];

/// A surname token followed by one to three more words and nothing else.
static SIGNATORY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:nguyễn|trần|lê|hoàng|huỳnh|bùi|vũ|võ|hà|lương|phạm|phan|la|lự|bàn|triệu|ma|chu|vi|lý|ngô|đặng|đinh|sầm|nông|hứa|đỗ|dương|phùng|trương|vàng|sùng|vương|giàng)(?:\s+\w+){1,3}$",
    )
    .expect("valid regex")
});

/// Configured text filter: the built-in lists plus config additions.
#[derive(Debug, Clone)]
pub struct TextFilter {
    noise_keywords: Vec<String>,
    heading_phrases: HashSet<String>,
}

impl Default for TextFilter {
    fn default() -> Self {
        Self {
            noise_keywords: NOISE_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            heading_phrases: HEADING_PHRASES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextFilter {
    pub fn from_config(config: &FiltersConfig) -> Self {
        let mut filter = Self::default();
        filter.noise_keywords.extend(
            config
                .extra_noise_keywords
                .iter()
                .map(|k| k.trim().to_lowercase())
                .filter(|k| !k.is_empty()),
        );
        filter.heading_phrases.extend(
            config
                .extra_heading_phrases
                .iter()
                .map(|p| p.trim().to_lowercase()),
        );
        filter
    }

    /// Whether `lower` (already lowercased) starts with a noise keyword.
    pub fn starts_with_noise(&self, lower: &str) -> bool {
        self.noise_keywords.iter().any(|k| lower.starts_with(k.as_str()))
    }

    /// Whether a candidate name should be dropped.
    pub fn is_noise(&self, name: &str) -> bool {
        let trimmed = name.trim();
        let lower = trimmed.to_lowercase();

        self.heading_phrases.contains(&lower)
            || UNIT_PREFIXES.iter().any(|p| lower.starts_with(p))
            || SIGNATORY_LINE.is_match(trimmed)
            || self.starts_with_noise(&lower)
    }

    /// Drop noise items, preserving the order of the survivors.
    pub fn apply(&self, items: Vec<Item>) -> Vec<Item> {
        let before = items.len();
        let kept: Vec<Item> = items
            .into_iter()
            .filter(|item| !item.name.trim().is_empty() && !self.is_noise(&item.name))
            .collect();
        tracing::debug!(before, after = kept.len(), "text filter applied");
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(items: &[Item]) -> Vec<&str> {
        items.iter().map(|i| i.name.as_str()).collect()
    }

    #[test]
    fn drops_structural_headings_case_insensitively() {
        let filter = TextFilter::default();
        let items = vec![
            Item::new("NỘI DUNG"),
            Item::new("Total"),
            Item::new("Chi sự nghiệp giáo dục"),
        ];
        let kept = filter.apply(items);
        assert_eq!(names(&kept), vec!["Chi sự nghiệp giáo dục"]);
    }

    #[test]
    fn survivors_never_equal_a_heading() {
        let filter = TextFilter::default();
        let items: Vec<Item> = HEADING_PHRASES
            .iter()
            .flat_map(|h| [Item::new(h.to_uppercase()), Item::new(format!("{h} mở rộng"))])
            .collect();
        for item in filter.apply(items) {
            let lower = item.name.to_lowercase();
            assert!(!HEADING_PHRASES.contains(&lower.as_str()), "{lower}");
        }
    }

    #[test]
    fn drops_unit_labels_and_noise_prefixes() {
        let filter = TextFilter::default();
        assert!(filter.is_noise("Đơn vị tính: triệu đồng"));
        assert!(filter.is_noise("Unit: million VND"));
        assert!(filter.is_noise("Tổng cộng các khoản chi"));
        assert!(filter.is_noise("Huyện Bảo Lâm"));
        assert!(!filter.is_noise("Xây dựng trường học"));
    }

    #[test]
    fn drops_signatory_lines_only() {
        let filter = TextFilter::default();
        assert!(filter.is_noise("Nguyễn Văn An"));
        assert!(filter.is_noise("trần thị bích ngọc"));
        assert!(!filter.is_noise("Nguyễn"));
        assert!(!filter.is_noise("Lê Văn Tám chi hỗ trợ hộ nghèo năm 2024"));
    }

    #[test]
    fn config_extends_builtin_lists() {
        let config = FiltersConfig {
            extra_noise_keywords: vec!["Phường".into()],
            extra_heading_phrases: vec!["Ghi chú".into()],
            ..FiltersConfig::default()
        };
        let filter = TextFilter::from_config(&config);
        assert!(filter.is_noise("Phường Bến Nghé"));
        assert!(filter.is_noise("ghi chú"));
        assert!(!TextFilter::default().is_noise("Phường Bến Nghé"));
    }
}
