//! Keyword gate restricting the assistant to writing and citation questions.
//!
//! This is a substring heuristic, not a classifier: "what is a run-on
//! sentence" is rejected because it contains "what is".

/// Any of these marks a question as off-topic, even if on-topic words appear too
pub const OFF_TOPIC_KEYWORDS: &[&str] = &[
    "recipe",
    "cook",
    "pasta",
    "pizza",
    "weather",
    "joke",
    "movie",
    "song",
    "music",
    "sports",
    "football",
    "basketball",
    "stock price",
    "bitcoin",
    "crypto",
    "video game",
    "horoscope",
    "dating",
    "what is",
    "who is",
    "tell me about",
];

/// Writing, citation and formatting vocabulary
pub const ON_TOPIC_KEYWORDS: &[&str] = &[
    "apa",
    "mla",
    "chicago",
    "cite",
    "citation",
    "citing",
    "reference",
    "bibliography",
    "works cited",
    "in-text",
    "footnote",
    "format",
    "essay",
    "thesis",
    "paragraph",
    "grammar",
    "punctuation",
    "comma",
    "semicolon",
    "sentence",
    "writing",
    "write",
    "email",
    "e-mail",
    "cover letter",
    "resume",
    "plagiarism",
    "quote",
    "quotation",
    "paraphrase",
    "abstract",
    "title page",
    "journal",
    "article",
    "owl",
];

/// Reply shown instead of an answer when a question is off-topic
pub const OFF_TOPIC_REPLY: &str = "I can only help with writing questions based on Purdue OWL resources:\n\n\
- APA Citation Format\n\
- MLA Citation Format\n\
- Professional Email Writing\n\
- Academic Writing Tips\n\n\
Please ask something related to one of these topics.";

/// Decide whether `query` is within the assistant's domain
///
/// Off-topic keywords win over on-topic ones; anything matching neither list
/// is let through.
pub fn is_on_topic(query: &str) -> bool {
    let query = query.to_lowercase();

    if OFF_TOPIC_KEYWORDS.iter().any(|keyword| query.contains(keyword)) {
        return false;
    }
    if ON_TOPIC_KEYWORDS.iter().any(|keyword| query.contains(keyword)) {
        return true;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_verdicts() {
        assert!(is_on_topic("How do I cite a journal article in APA?"));
        assert!(!is_on_topic("What's a good pasta recipe?"));
        assert!(!is_on_topic("Tell me a joke"));
    }

    #[test]
    fn test_off_topic_takes_precedence() {
        assert!(!is_on_topic("Write me a song about MLA citations"));
        assert!(!is_on_topic("what is a run-on sentence"));
    }

    #[test]
    fn test_case_insensitive_and_permissive_fallback() {
        assert!(is_on_topic("HOW SHOULD I FORMAT A COVER LETTER"));
        assert!(is_on_topic("Help me please"));
        assert!(is_on_topic(""));
    }
}
