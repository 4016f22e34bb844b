use std::sync::Arc;

use htmd::HtmlToMarkdown;
use jobscout_core::error::AppError;
use jobscout_core::models::DescriptionFormat;
use jobscout_core::traits::Cleaner;
use scraper::{Html, Node};

const SKIPPED_TAGS: [&str; 9] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript", "iframe", "svg",
];

/// HTML-to-Markdown cleaner using htmd.
///
/// Used for job descriptions when the requested format is Markdown.
pub struct HtmdCleaner {
    converter: Arc<HtmlToMarkdown>,
}

impl Clone for HtmdCleaner {
    fn clone(&self) -> Self {
        Self {
            converter: Arc::clone(&self.converter),
        }
    }
}

impl HtmdCleaner {
    pub fn new() -> Self {
        let converter = HtmlToMarkdown::builder()
            .skip_tags(SKIPPED_TAGS.to_vec())
            .build();

        Self {
            converter: Arc::new(converter),
        }
    }
}

impl Default for HtmdCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl Cleaner for HtmdCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        self.converter
            .convert(html)
            .map(|markdown| markdown.trim().to_string())
            .map_err(|e| AppError::Cleaner(e.to_string()))
    }
}

/// Visible text of an HTML page with whitespace collapsed.
///
/// This is what enrichment extractors read: no markup, no scripts or
/// navigation chrome.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextCleaner;

impl PlainTextCleaner {
    pub fn new() -> Self {
        Self
    }
}

impl Cleaner for PlainTextCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        let document = Html::parse_document(html);
        let mut words: Vec<&str> = Vec::new();

        for node in document.root_element().descendants() {
            let Node::Text(text) = node.value() else {
                continue;
            };
            let hidden = node.ancestors().any(|ancestor| {
                ancestor
                    .value()
                    .as_element()
                    .is_some_and(|el| SKIPPED_TAGS.contains(&el.name()))
            });
            if !hidden {
                words.extend(text.split_whitespace());
            }
        }

        Ok(words.join(" "))
    }
}

/// Renders a description in the requested output format.
pub fn format_description(html: &str, format: DescriptionFormat) -> Result<String, AppError> {
    match format {
        DescriptionFormat::Markdown => HtmdCleaner::new().clean(html),
        DescriptionFormat::Html => Ok(html.to_string()),
        DescriptionFormat::Plain => PlainTextCleaner::new().clean(html),
    }
}
