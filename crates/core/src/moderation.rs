//! Static keyword moderation for image prompts.
//!
//! A prompt is blocked when it contains any configured term as a
//! case-insensitive substring. Blocked prompts are not rejected; the
//! caller swaps in [`PLACEHOLDER_PROMPT`] instead.

use std::path::Path;

/// Prompt substituted for any blocked request.
pub const PLACEHOLDER_PROMPT: &str = "my little pony in a field";

/// Terms used when no keyword file is present.
pub const DEFAULT_KEYWORDS: &[&str] = &["nude", "naked", "explicit", "nsfw"];

/// Outcome of moderating one prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModerationDecision {
    pub blocked: bool,
    /// The prompt to use instead, present only when `blocked`.
    pub substitute: Option<&'static str>,
}

/// Case-insensitive substring filter over a fixed term list.
///
/// Read-only after construction; share it behind an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct ModerationFilter {
    keywords: Vec<String>,
}

impl ModerationFilter {
    /// Build a filter from raw terms. Terms are trimmed and lowercased;
    /// blank entries are dropped.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        Self { keywords }
    }

    /// Filter seeded with [`DEFAULT_KEYWORDS`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_KEYWORDS.iter().copied())
    }

    /// Load one term per line from `path`.
    ///
    /// A missing file falls back to [`DEFAULT_KEYWORDS`]. An unreadable
    /// file yields an empty filter that never blocks.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                let filter = Self::new(contents.lines());
                tracing::info!(
                    path = %path.display(),
                    count = filter.len(),
                    "Loaded moderation keywords",
                );
                filter
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %path.display(),
                    "Keyword file not found, using built-in defaults",
                );
                Self::with_defaults()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Keyword file unreadable, moderation disabled",
                );
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// `true` if the prompt contains any disallowed term.
    pub fn classify(&self, prompt: &str) -> bool {
        let lower = prompt.to_lowercase();
        self.keywords.iter().any(|k| lower.contains(k.as_str()))
    }

    /// Classify and attach the substitute prompt when blocked.
    pub fn decide(&self, prompt: &str) -> ModerationDecision {
        let blocked = self.classify(prompt);
        ModerationDecision {
            blocked,
            substitute: blocked.then_some(PLACEHOLDER_PROMPT),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn blocks_regardless_of_case() {
        let filter = ModerationFilter::with_defaults();
        assert!(filter.classify("an NSFW scene"));
        assert!(filter.classify("Naked statue"));
        assert!(filter.classify("nsfw"));
    }

    #[test]
    fn clean_prompt_passes() {
        let filter = ModerationFilter::with_defaults();
        assert!(!filter.classify("a cat on a windowsill"));
    }

    #[test]
    fn substring_match_inside_word() {
        let filter = ModerationFilter::new(["nude"]);
        assert!(filter.classify("denuded forest"));
    }

    #[test]
    fn empty_filter_never_blocks() {
        let filter = ModerationFilter::default();
        assert!(filter.is_empty());
        assert!(!filter.classify("nsfw explicit naked"));
    }

    #[test]
    fn blank_terms_are_dropped() {
        let filter = ModerationFilter::new(["", "   ", "Gore "]);
        assert_eq!(filter.len(), 1);
        assert!(filter.classify("GORE everywhere"));
        assert!(!filter.classify("a quiet lake"));
    }

    #[test]
    fn decide_substitutes_placeholder() {
        let filter = ModerationFilter::with_defaults();
        let blocked = filter.decide("explicit content");
        assert!(blocked.blocked);
        assert_eq!(blocked.substitute, Some(PLACEHOLDER_PROMPT));

        let clean = filter.decide("a lighthouse at dusk");
        assert!(!clean.blocked);
        assert_eq!(clean.substitute, None);
    }

    #[test]
    fn load_reads_one_term_per_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Forbidden\n\n  spooky  ").unwrap();

        let filter = ModerationFilter::load(file.path());
        assert_eq!(filter.len(), 2);
        assert!(filter.classify("a SPOOKY house"));
        assert!(!filter.classify("nsfw"));
    }

    #[test]
    fn load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let filter = ModerationFilter::load(&dir.path().join("absent.txt"));
        assert_eq!(filter.len(), DEFAULT_KEYWORDS.len());
        assert!(filter.classify("nsfw"));
    }

    #[test]
    fn load_unreadable_path_never_blocks() {
        // A directory cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();
        let filter = ModerationFilter::load(dir.path());
        assert!(filter.is_empty());
    }
}
