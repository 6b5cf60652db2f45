use once_cell::sync::Lazy;
use regex::Regex;

/// Expand common typographic ligatures found in PDFs.
pub fn expand_ligatures(text: &str) -> String {
    text.replace('\u{FB00}', "ff")
        .replace('\u{FB01}', "fi")
        .replace('\u{FB02}', "fl")
        .replace('\u{FB03}', "ffi")
        .replace('\u{FB04}', "ffl")
        .replace(['\u{FB05}', '\u{FB06}'], "st")
}

/// Normalize whitespace in a page of extracted text.
///
/// - runs of spaces/tabs become a single space
/// - each line is trimmed
/// - runs of blank lines become a single newline
pub fn clean_text(text: &str) -> String {
    static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\n\s*)+\n").unwrap());
    static SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());

    let text = SPACES.replace_all(text, " ");
    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let joined = lines.join("\n");
    BLANK_LINES.replace_all(&joined, "\n").trim().to_string()
}

/// Remove markdown emphasis/heading characters so they are not read aloud.
pub fn strip_markdown(text: &str) -> String {
    static MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\*#_`~]+").unwrap());
    MARKUP.replace_all(text, "").into_owned()
}
