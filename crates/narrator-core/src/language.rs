//! Output languages supported for explanations and speech.

/// A language the explanation can be written and spoken in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Language {
    /// Human-readable name, used verbatim in prompts.
    pub name: &'static str,
    /// ISO 639-1 code, used by the speech service.
    pub code: &'static str,
    /// Tesseract traineddata name for OCR in this language.
    pub tesseract: &'static str,
}

pub const SUPPORTED_LANGUAGES: &[Language] = &[
    Language::new("English", "en", "eng"),
    Language::new("Hindi", "hi", "hin"),
    Language::new("Gujarati", "gu", "guj"),
    Language::new("Marathi", "mr", "mar"),
    Language::new("Tamil", "ta", "tam"),
    Language::new("Telugu", "te", "tel"),
    Language::new("Kannada", "kn", "kan"),
    Language::new("Bengali", "bn", "ben"),
    Language::new("Malayalam", "ml", "mal"),
    Language::new("Punjabi", "pa", "pan"),
    Language::new("Urdu", "ur", "urd"),
];

impl Language {
    const fn new(name: &'static str, code: &'static str, tesseract: &'static str) -> Self {
        Self {
            name,
            code,
            tesseract,
        }
    }

    /// Find a supported language by name or code, ignoring case.
    pub fn lookup(query: &str) -> Option<Language> {
        let query = query.trim();
        SUPPORTED_LANGUAGES
            .iter()
            .find(|l| l.name.eq_ignore_ascii_case(query) || l.code.eq_ignore_ascii_case(query))
            .copied()
    }
}

impl Default for Language {
    fn default() -> Self {
        SUPPORTED_LANGUAGES[0]
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
