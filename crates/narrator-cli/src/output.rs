use std::io::Write;
use std::path::{Path, PathBuf};

use narrator_core::{ExtractedText, SUPPORTED_LANGUAGES, Snapshot, Stage};
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Spinner message for a pipeline stage, if the stage is shown at all.
pub fn stage_label(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Extracting => Some("Extracting text (OCR for scanned pages)..."),
        Stage::Generating => Some("Generating summary and explanation..."),
        Stage::Synthesizing => Some("Synthesizing speech..."),
        Stage::Idle | Stage::Ready | Stage::Error => None,
    }
}

pub fn ocr_notice(pages: &[usize], color: ColorMode) -> String {
    let list = pages
        .iter()
        .map(|p| (p + 1).to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let msg = format!("Used OCR for scanned page(s) {}", list);
    if color.enabled() {
        msg.dimmed().to_string()
    } else {
        msg
    }
}

pub fn feedback_prompt(color: ColorMode) -> String {
    let msg = "Feedback (empty line to finish): ";
    if color.enabled() {
        msg.cyan().bold().to_string()
    } else {
        msg.to_string()
    }
}

pub fn print_error(w: &mut dyn Write, message: &str, color: ColorMode) -> std::io::Result<()> {
    if color.enabled() {
        writeln!(w, "{} {}", "ERROR:".red().bold(), message)
    } else {
        writeln!(w, "ERROR: {}", message)
    }
}

fn heading(w: &mut dyn Write, title: &str, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    if color.enabled() {
        writeln!(w, "{}", title.bold().underline())
    } else {
        writeln!(w, "{}", title)?;
        writeln!(w, "{}", "=".repeat(title.len()))
    }
}

/// Print the summary and explanation of a snapshot.
pub fn print_snapshot(
    w: &mut dyn Write,
    snapshot: &Snapshot,
    color: ColorMode,
) -> std::io::Result<()> {
    let suffix = if snapshot.revision > 0 {
        format!(" (revision {})", snapshot.revision)
    } else {
        String::new()
    };

    heading(w, &format!("Summary{}", suffix), color)?;
    if snapshot.content.summary.is_empty() {
        let msg = "(the model did not return a separate summary)";
        if color.enabled() {
            writeln!(w, "{}", msg.dimmed())?;
        } else {
            writeln!(w, "{}", msg)?;
        }
    } else {
        writeln!(w, "{}", snapshot.content.summary)?;
    }

    heading(w, &format!("Explanation{}", suffix), color)?;
    writeln!(w, "{}", snapshot.content.explanation)?;
    Ok(())
}

/// Files written for one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    pub summary: PathBuf,
    pub explanation: PathBuf,
    /// `None` when there was nothing to speak.
    pub audio: Option<PathBuf>,
}

/// Revision 0 writes `summary.md`, `explanation.md` and `explanation.mp3`;
/// later revisions add an `-rN` suffix so earlier files are kept.
pub fn artifact_stem(base: &str, revision: u32) -> String {
    if revision == 0 {
        base.to_string()
    } else {
        format!("{}-r{}", base, revision)
    }
}

pub fn write_artifacts(out_dir: &Path, snapshot: &Snapshot) -> std::io::Result<Artifacts> {
    let summary = out_dir.join(format!("{}.md", artifact_stem("summary", snapshot.revision)));
    let explanation_stem = artifact_stem("explanation", snapshot.revision);
    let explanation = out_dir.join(format!("{}.md", explanation_stem));

    std::fs::write(&summary, &snapshot.content.summary)?;
    std::fs::write(&explanation, &snapshot.content.explanation)?;

    let audio = if snapshot.audio.is_empty() {
        None
    } else {
        let path = out_dir.join(format!(
            "{}.{}",
            explanation_stem,
            snapshot.audio.format.extension()
        ));
        std::fs::write(&path, &snapshot.audio.bytes)?;
        Some(path)
    };

    Ok(Artifacts {
        summary,
        explanation,
        audio,
    })
}

pub fn print_artifacts(
    w: &mut dyn Write,
    artifacts: &Artifacts,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w)?;
    let mut lines = vec![
        format!("Summary written to {}", artifacts.summary.display()),
        format!("Explanation written to {}", artifacts.explanation.display()),
    ];
    match &artifacts.audio {
        Some(path) => lines.push(format!("Audio written to {}", path.display())),
        None => lines.push("No audio: the explanation had nothing to speak".to_string()),
    }
    for line in lines {
        if color.enabled() {
            writeln!(w, "{}", line.green())?;
        } else {
            writeln!(w, "{}", line)?;
        }
    }
    Ok(())
}

/// Print the extracted text with per-page OCR statistics.
pub fn print_extraction(
    w: &mut dyn Write,
    file_name: &str,
    extracted: &ExtractedText,
    color: ColorMode,
) -> std::io::Result<()> {
    let stats = format!(
        "{}: {} page(s), {} via OCR, {} characters",
        file_name,
        extracted.page_count(),
        extracted.ocr_pages().len(),
        extracted.as_str().chars().count()
    );
    if color.enabled() {
        writeln!(w, "{}", stats.bold())?;
    } else {
        writeln!(w, "{}", stats)?;
    }
    writeln!(w)?;
    if extracted.is_blank() {
        writeln!(w, "(no text could be extracted)")?;
    } else {
        writeln!(w, "{}", extracted)?;
    }
    Ok(())
}

pub fn print_languages(w: &mut dyn Write) -> std::io::Result<()> {
    writeln!(w, "{:<12} {:<6} {}", "LANGUAGE", "CODE", "OCR")?;
    for lang in SUPPORTED_LANGUAGES {
        writeln!(w, "{:<12} {:<6} {}", lang.name, lang.code, lang.tesseract)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use narrator_core::{AudioClip, GeneratedContent};

    use super::*;

    fn snapshot(revision: u32, audio: AudioClip) -> Snapshot {
        Snapshot {
            source_name: "doc.pdf".into(),
            extracted: ExtractedText::new("Hello".into(), 1, vec![]),
            content: GeneratedContent {
                summary: "Short.".into(),
                explanation: "Long, with an example.".into(),
            },
            audio,
            revision,
        }
    }

    #[test]
    fn writes_initial_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let written =
            write_artifacts(dir.path(), &snapshot(0, AudioClip::mp3(b"ID3".to_vec()))).unwrap();
        assert_eq!(written.summary, dir.path().join("summary.md"));
        assert_eq!(written.audio, Some(dir.path().join("explanation.mp3")));
        assert_eq!(
            std::fs::read_to_string(&written.explanation).unwrap(),
            "Long, with an example."
        );
        assert_eq!(std::fs::read(dir.path().join("explanation.mp3")).unwrap(), b"ID3");
    }

    #[test]
    fn revisions_get_suffix_and_empty_audio_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let written = write_artifacts(dir.path(), &snapshot(2, AudioClip::empty())).unwrap();
        assert_eq!(written.explanation, dir.path().join("explanation-r2.md"));
        assert_eq!(written.summary, dir.path().join("summary-r2.md"));
        assert!(written.audio.is_none());
        assert!(!dir.path().join("explanation-r2.mp3").exists());
    }

    #[test]
    fn plain_snapshot_output() {
        let mut buf = Vec::new();
        print_snapshot(&mut buf, &snapshot(1, AudioClip::empty()), ColorMode(false)).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert!(out.contains("Summary (revision 1)\n===================="));
        assert!(out.contains("Short."));
        assert!(out.contains("Long, with an example."));
    }

    #[test]
    fn ocr_notice_is_one_based() {
        assert_eq!(
            ocr_notice(&[0, 2], ColorMode(false)),
            "Used OCR for scanned page(s) 1, 3"
        );
    }

    #[test]
    fn languages_table_lists_all() {
        let mut buf = Vec::new();
        print_languages(&mut buf).unwrap();
        let out = String::from_utf8(buf).unwrap();
        assert_eq!(out.lines().count(), SUPPORTED_LANGUAGES.len() + 1);
        assert!(out.contains("Hindi"));
    }

    #[test]
    fn stage_labels() {
        assert!(stage_label(Stage::Generating).is_some());
        assert!(stage_label(Stage::Ready).is_none());
    }
}
