//! Email analysis.
//!
//! The Gmail route asks an [`EmailAnalyzer`] for a short summary, a priority
//! and a category. Analysis never fails: when the model is unavailable or
//! answers with something unparseable, [`fallback_analysis`] is used.

pub mod summarizer;

use async_trait::async_trait;

use crate::models::{EmailAnalysis, EmailCategory, EmailPriority};

pub use summarizer::ClaudeAnalyzer;

const FALLBACK_SUMMARY_CHARS: usize = 150;

#[async_trait]
pub trait EmailAnalyzer: Send + Sync {
    async fn analyze(&self, subject: &str, to: &str, body: &str) -> EmailAnalysis;
}

/// Character-safe prefix of `text`
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

pub fn fallback_analysis(body: &str) -> EmailAnalysis {
    EmailAnalysis {
        summary: format!("{}...", truncate_chars(body, FALLBACK_SUMMARY_CHARS)),
        priority: EmailPriority::Normal,
        category: EmailCategory::Other,
    }
}
