use crate::store::SearchHit;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

/// Separator placed between retrieved passages in the context string
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Appended to raw passages when no completion model is configured
pub const NO_COMPLETION_HINT: &str = "\n\n---\n*Set OPENAI_API_KEY for synthesized answers. \
For more details, visit [Purdue OWL](https://owl.purdue.edu)*";

/// Shown when the index holds nothing relevant
pub const NO_RESULTS_REPLY: &str =
    "I couldn't find anything about that in the Purdue OWL resources I have indexed.";

/// Distinct source labels in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceSet(Vec<String>);

impl SourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `label` unless it is already present
    pub fn insert(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.0.contains(&label) {
            self.0.push(label);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for SourceSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut sources = SourceSet::new();
        for label in iter {
            sources.insert(label);
        }
        sources
    }
}

impl fmt::Display for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

/// One assistant turn ready for display
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantReply {
    pub content: String,
    pub sources: SourceSet,
}

impl AssistantReply {
    /// A reply without attributions
    pub fn plain(content: impl Into<String>) -> Self {
        AssistantReply {
            content: content.into(),
            sources: SourceSet::new(),
        }
    }
}

/// Render hits as `[Source N: path]` blocks for the completion prompt
pub fn format_context(hits: &[SearchHit]) -> String {
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("[Source {}: {}]\n{}", i + 1, hit.chunk.source, hit.chunk.text))
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// Strip source headers and separator lines from a context string
pub fn clean_context(context: &str) -> String {
    static SOURCE_HEADER: OnceLock<Regex> = OnceLock::new();
    static BLANK_RUN: OnceLock<Regex> = OnceLock::new();

    let source_header = SOURCE_HEADER
        .get_or_init(|| Regex::new(r"\[Source \d+: [^\]]+\]\n?").expect("valid source header pattern"));
    let blank_run = BLANK_RUN.get_or_init(|| Regex::new(r"\n{3,}").expect("valid blank run pattern"));

    let cleaned = source_header.replace_all(context, "");
    let cleaned = cleaned.replace(CONTEXT_SEPARATOR, "\n\n");
    let cleaned = blank_run.replace_all(&cleaned, "\n\n");

    cleaned.trim().to_string()
}

/// Build the displayed answer for a turn
///
/// A completion, when present, is the answer; otherwise the cleaned passages
/// are shown followed by [`NO_COMPLETION_HINT`].
pub fn compose(hits: &[SearchHit], completion: Option<String>) -> AssistantReply {
    let sources: SourceSet = hits.iter().map(|hit| hit.chunk.source_label()).collect();

    let content = match completion {
        Some(answer) => answer.trim().to_string(),
        None if hits.is_empty() => NO_RESULTS_REPLY.to_string(),
        None => format!("{}{}", clean_context(&format_context(hits)), NO_COMPLETION_HINT),
    };

    AssistantReply { content, sources }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::TextChunk;

    fn hit(source: &str, text: &str) -> SearchHit {
        SearchHit {
            chunk: TextChunk {
                text: text.to_string(),
                source: source.to_string(),
                chunk_index: 0,
                start_position: 0,
            },
            distance: 0.1,
        }
    }

    #[test]
    fn test_format_context() {
        let context = format_context(&[
            hit("data/apa.txt", "Use author-date."),
            hit("data/mla.txt", "Use author-page."),
        ]);
        assert_eq!(
            context,
            "[Source 1: data/apa.txt]\nUse author-date.\n\n---\n\n[Source 2: data/mla.txt]\nUse author-page."
        );
    }

    #[test]
    fn test_clean_context_strips_markers_and_blank_runs() {
        let context = "[Source 1: data/apa.txt]\nFirst.\n\n\n\n\nStill first.\n\n---\n\n[Source 12: data/mla guide.txt]\nSecond.\n";
        let cleaned = clean_context(context);

        assert_eq!(cleaned, "First.\n\nStill first.\n\nSecond.");
        assert!(!cleaned.contains("[Source"));
        assert!(!cleaned.contains("\n\n\n"));
    }

    #[test]
    fn test_without_completion_shows_context_and_hint() {
        let hits = [
            hit("data/apa.txt", "Use author-date."),
            hit("data/apa.txt", "Include page numbers for quotes."),
            hit("data/email.txt", "Keep subject lines short."),
        ];
        let reply = compose(&hits, None);

        assert_eq!(
            reply.content,
            format!("{}{}", clean_context(&format_context(&hits)), NO_COMPLETION_HINT)
        );
        assert_eq!(
            reply.sources.iter().collect::<Vec<_>>(),
            vec!["apa.txt", "email.txt"]
        );
    }

    #[test]
    fn test_completion_is_the_answer() {
        let reply = compose(
            &[hit("data/apa.txt", "Use author-date.")],
            Some("  APA uses author-date citations.\n".to_string()),
        );
        assert_eq!(reply.content, "APA uses author-date citations.");
        assert_eq!(reply.sources.to_string(), "apa.txt");
    }

    #[test]
    fn test_no_hits() {
        let reply = compose(&[], None);
        assert_eq!(reply.content, NO_RESULTS_REPLY);
        assert!(reply.sources.is_empty());
    }
}
