//! Shared style suffix for generation prompts
//!
//! Every page is rendered in the same watercolor look, so the catalog's style
//! tags are appended to each positive prompt before it reaches a backend.

use crate::catalog::{PromptCatalog, PromptEntry};

/// Style vocabulary appended to every positive prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleTags {
    tags: Vec<String>,
}

impl StyleTags {
    pub fn new(tags: Vec<String>) -> Self {
        Self { tags }
    }

    pub fn from_catalog(catalog: &PromptCatalog) -> Self {
        Self::new(catalog.style_tags.clone())
    }

    /// Tags joined the way they are appended, e.g. `"soft watercolor, gentle colors"`
    pub fn suffix(&self) -> String {
        self.tags.join(", ")
    }

    /// Append the style suffix to a base prompt
    pub fn enrich_prompt(&self, base_prompt: &str) -> String {
        if self.tags.is_empty() {
            return base_prompt.to_string();
        }
        format!("{}, {}", base_prompt, self.suffix())
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

/// A page's prompts as they are actually sent to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedPrompt {
    pub page_id: String,
    pub positive: String,
    pub negative: String,
}

impl FormattedPrompt {
    pub fn new(entry: &PromptEntry, style: &StyleTags) -> Self {
        Self {
            page_id: entry.page_id.clone(),
            positive: style.enrich_prompt(&entry.positive_prompt),
            negative: entry.negative_prompt.clone(),
        }
    }

    /// Single-line `positive | negative` form for pasting into web UIs
    pub fn copy_line(&self) -> String {
        format!("{} | {}", self.positive, self.negative)
    }
}

/// Format every catalog entry with the catalog's own style tags
pub fn format_catalog(catalog: &PromptCatalog) -> Vec<FormattedPrompt> {
    let style = StyleTags::from_catalog(catalog);
    catalog
        .entries()
        .map(|entry| FormattedPrompt::new(&entry, &style))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enrich_prompt() {
        let style = StyleTags::new(vec!["soft watercolor".to_string(), "pastel colors".to_string()]);
        assert_eq!(
            style.enrich_prompt("a floating bubble"),
            "a floating bubble, soft watercolor, pastel colors"
        );
    }

    #[test]
    fn test_enrich_prompt_without_tags() {
        let style = StyleTags::new(vec![]);
        assert_eq!(style.enrich_prompt("a floating bubble"), "a floating bubble");
    }

    #[test]
    fn test_format_catalog_keeps_order_and_negative() {
        let mut catalog = PromptCatalog::empty();
        catalog.insert("cover", "P", "N");
        catalog.insert("page_01_birth", "Q", "M");

        let formatted = format_catalog(&catalog);
        assert_eq!(formatted.len(), 2);
        assert_eq!(formatted[0].page_id, "cover");
        assert!(formatted[0].positive.starts_with("P, children's book illustration"));
        assert_eq!(formatted[0].negative, "N");
        assert!(formatted[1].copy_line().ends_with(" | M"));
    }
}
