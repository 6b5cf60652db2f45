//! Prompt construction and response parsing for the explanation model.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::language::Language;
use crate::GeneratedContent;

pub const SYSTEM_INSTRUCTION: &str =
    "You are an expert educator who explains complex topics in simple terms.";

pub const SUMMARY_LABEL: &str = "SUMMARY:";
pub const EXPLANATION_LABEL: &str = "EXPLANATION:";

/// Options shared by every prompt of a session.
#[derive(Debug, Clone, Default)]
pub struct PromptOptions<'a> {
    pub language: Language,
    pub keywords: &'a [String],
}

fn push_preferences(prompt: &mut String, keywords: &[String]) {
    let keywords: Vec<&str> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .collect();
    if !keywords.is_empty() {
        prompt.push_str(&format!(
            "\nUSER PREFERENCES: The user is particularly interested in these topics: {}. \
             Please emphasize them if relevant.\n",
            keywords.join(", ")
        ));
    }
}

fn push_format(prompt: &mut String) {
    prompt.push_str(&format!(
        "\nFormat your answer as exactly two sections, each starting on its own line \
         with its label:\n{}\n<the summary>\n{}\n<the explanation>\n",
        SUMMARY_LABEL, EXPLANATION_LABEL
    ));
}

/// Prompt asking for a summary and a detailed explanation of `text`.
pub fn initial_prompt(text: &str, opts: &PromptOptions<'_>) -> String {
    let language = opts.language.name;
    let mut prompt = format!(
        "You are an expert teacher explaining the following document to someone who is \
         learning about this topic for the first time. Write in {language}.\n\
         1. Summarize the document in a few simple sentences. Focus only on the core \
         message; the goal is a very quick overview.\n\
         2. Then give a detailed, engaging and easy-to-understand explanation for a \
         complete beginner. Use simple words, short sentences and a friendly tone. \
         Crucially, use relatable real-life examples or analogies to make the main \
         concepts understandable.\n"
    );
    push_preferences(&mut prompt, opts.keywords);
    push_format(&mut prompt);
    prompt.push_str(&format!("\nDOCUMENT:\n---\n{}\n", text));
    prompt
}

/// Prompt asking for a revised explanation (and optionally summary).
pub fn revision_prompt(
    prior_summary: &str,
    prior_explanation: &str,
    feedback: &str,
    history: &[String],
    revise_summary: bool,
    opts: &PromptOptions<'_>,
) -> String {
    let language = opts.language.name;
    let mut prompt = format!(
        "IMPROVEMENT INSTRUCTIONS:\nThe user was not satisfied with a previous explanation \
         of a document. Based on their feedback, refine the explanation. Write in \
         {language}, keep it beginner-friendly and keep using real-life examples.\n"
    );

    if revise_summary {
        prompt.push_str(&format!("\nPREVIOUS SUMMARY:\n---\n{}\n", prior_summary));
    }
    prompt.push_str(&format!("\nPREVIOUS EXPLANATION:\n---\n{}\n", prior_explanation));

    let earlier: Vec<&str> = history
        .iter()
        .map(|h| h.trim())
        .filter(|h| !h.is_empty())
        .collect();
    if !earlier.is_empty() {
        prompt.push_str("\nEARLIER FEEDBACK (already addressed, keep honoring it):\n");
        for item in earlier {
            prompt.push_str(&format!("- {}\n", item));
        }
    }
    prompt.push_str(&format!("\nFEEDBACK: '{}'\n", feedback.trim()));
    push_preferences(&mut prompt, opts.keywords);

    if revise_summary {
        push_format(&mut prompt);
    } else {
        prompt.push_str("\nRespond with the revised explanation only.\n");
    }
    prompt
}

/// Whether a piece of feedback explicitly asks for a change to the summary.
pub fn feedback_mentions_summary(feedback: &str) -> bool {
    static RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)\b(summary|summaries|summari[sz]e|tl;?dr|overview)\b").unwrap()
    });
    RE.is_match(feedback)
}

// A section label on its own line, tolerating markdown decoration such as
// "## Summary", "**Summary:**" or "1. Summary".
static SUMMARY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^[ \t>#*_\d.)-]*summary[ \t*_]*(?::[ \t*_]*|\r?$)").unwrap()
});
static EXPLANATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)^[ \t>#*_\d.)-]*(?:detailed[ \t]+)?explanation[ \t*_]*(?::[ \t*_]*|\r?$)",
    )
    .unwrap()
});

/// Split a model response into summary and explanation.
///
/// When the two labeled sections are not both present (in order), the whole
/// response is the explanation and the summary is empty.
pub fn parse_sections(response: &str) -> GeneratedContent {
    let summary = SUMMARY_RE.find(response);
    let explanation = summary.and_then(|s| EXPLANATION_RE.find_at(response, s.end()));

    match (summary, explanation) {
        (Some(s), Some(e)) => {
            let summary = response[s.end()..e.start()].trim();
            let explanation = response[e.end()..].trim();
            if explanation.is_empty() {
                return degraded(response);
            }
            GeneratedContent {
                summary: summary.to_string(),
                explanation: explanation.to_string(),
            }
        }
        _ => degraded(response),
    }
}

fn degraded(response: &str) -> GeneratedContent {
    tracing::warn!("response lacks summary/explanation sections; using it as the explanation");
    GeneratedContent {
        summary: String::new(),
        explanation: response.to_string(),
    }
}

/// Strip a leading explanation label the model may add even when asked for
/// the explanation only.
pub fn parse_explanation_only(response: &str) -> String {
    let trimmed = response.trim_start();
    match EXPLANATION_RE.find(trimmed) {
        Some(m) if m.start() == 0 => trimmed[m.end()..].trim().to_string(),
        _ => response.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts() -> PromptOptions<'static> {
        PromptOptions::default()
    }

    #[test]
    fn parses_colonless_labels_with_crlf_line_endings() {
        let content = parse_sections("SUMMARY\r\nS\r\nEXPLANATION\r\nE");
        assert_eq!(content.summary, "S");
        assert_eq!(content.explanation, "E");
    }

    #[test]
    fn parses_labeled_sections() {
        let content = parse_sections(
            "SUMMARY:\nPlants make food from light.\n\nEXPLANATION:\nThink of a leaf as a tiny kitchen.",
        );
        assert_eq!(content.summary, "Plants make food from light.");
        assert_eq!(content.explanation, "Think of a leaf as a tiny kitchen.");
    }

    #[test]
    fn parses_markdown_headings() {
        let content = parse_sections(
            "## Summary\nShort version.\n\n## Detailed Explanation\nLong version with an example.",
        );
        assert_eq!(content.summary, "Short version.");
        assert_eq!(content.explanation, "Long version with an example.");

        let content = parse_sections("**Summary:** one line\n**Explanation:** the rest");
        assert_eq!(content.summary, "one line");
        assert_eq!(content.explanation, "the rest");
    }

    #[test]
    fn missing_markers_degrade_to_explanation() {
        let raw = "Just some prose without any labels.\n";
        let content = parse_sections(raw);
        assert_eq!(content.summary, "");
        assert_eq!(content.explanation, raw);
    }

    #[test]
    fn explanation_before_summary_degrades() {
        let raw = "EXPLANATION:\nfirst\nSUMMARY:\nsecond";
        let content = parse_sections(raw);
        assert_eq!(content.summary, "");
        assert_eq!(content.explanation, raw);
    }

    #[test]
    fn word_inside_sentence_is_not_a_marker() {
        let raw = "This summary: is inline.\nAnd the explanation: too.";
        let content = parse_sections(raw);
        assert_eq!(content.summary, "");
        assert_eq!(content.explanation, raw);
    }

    #[test]
    fn explanation_only_strips_label() {
        assert_eq!(
            parse_explanation_only("EXPLANATION:\n  Simpler now. "),
            "Simpler now."
        );
        assert_eq!(parse_explanation_only("  Plain text\n"), "Plain text");
    }

    #[test]
    fn initial_prompt_contains_document_and_labels() {
        let keywords = vec!["energy".to_string(), " ".to_string()];
        let prompt = initial_prompt(
            "Photosynthesis converts light.",
            &PromptOptions {
                language: crate::Language::lookup("Hindi").unwrap(),
                keywords: &keywords,
            },
        );
        assert!(prompt.contains("Photosynthesis converts light."));
        assert!(prompt.contains(SUMMARY_LABEL));
        assert!(prompt.contains(EXPLANATION_LABEL));
        assert!(prompt.contains("real-life examples"));
        assert!(prompt.contains("Write in Hindi"));
        assert!(prompt.contains("interested in these topics: energy."));
    }

    #[test]
    fn revision_prompt_includes_prior_and_feedback() {
        let prompt = revision_prompt("S", "X", "make it simpler", &[], false, &opts());
        assert!(prompt.contains("PREVIOUS EXPLANATION:\n---\nX"));
        assert!(prompt.contains("FEEDBACK: 'make it simpler'"));
        assert!(!prompt.contains("PREVIOUS SUMMARY"));
        assert!(!prompt.contains(SUMMARY_LABEL));
    }

    #[test]
    fn revision_prompt_with_summary_and_history() {
        let history = vec!["shorter".to_string()];
        let prompt = revision_prompt("S", "X", "fix the summary", &history, true, &opts());
        assert!(prompt.contains("PREVIOUS SUMMARY:\n---\nS"));
        assert!(prompt.contains("- shorter"));
        assert!(prompt.contains(SUMMARY_LABEL));
    }

    #[test]
    fn detects_summary_feedback() {
        assert!(feedback_mentions_summary("The summary is too long"));
        assert!(feedback_mentions_summary("please summarize better"));
        assert!(!feedback_mentions_summary("add an example"));
    }
}
