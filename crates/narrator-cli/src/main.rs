use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use narrator_core::{
    Config, Language, Orchestrator, PipelineEvent, Services, Snapshot, SummaryPolicy,
    TesseractOcr, TextExtractor,
};
use narrator_pdf_mupdf::MupdfBackend;

mod output;

use output::ColorMode;

/// PDF Narrator - Turn a PDF into a beginner-friendly explanation you can listen to
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Summarize and explain a PDF, and narrate the explanation
    Explain {
        /// Path to the PDF to explain
        file_path: PathBuf,

        /// Directory the summary, explanation and audio are written to
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Output language, by name or code (see `narrator languages`)
        #[arg(short, long)]
        language: Option<String>,

        /// Comma-separated topics to emphasize
        #[arg(long, value_delimiter = ',')]
        keywords: Vec<String>,

        /// Gemini model name
        #[arg(long)]
        model: Option<String>,

        /// Gemini API key
        #[arg(long)]
        api_key: Option<String>,

        /// Whether feedback also revises the summary: keep, regenerate or follow
        #[arg(long)]
        summary_policy: Option<SummaryPolicy>,

        /// Feedback to apply after the first explanation (repeatable, applied in order)
        #[arg(short, long)]
        feedback: Vec<String>,

        /// Read further feedback from stdin until an empty line
        #[arg(short, long)]
        interactive: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Extract the text of a PDF (with OCR fallback) without calling any service
    Extract {
        /// Path to the PDF
        file_path: PathBuf,

        /// Tesseract language code for scanned pages, e.g. eng or hin
        #[arg(short, long)]
        language: Option<String>,

        /// Resolution scanned pages are rendered at
        #[arg(long)]
        dpi: Option<u32>,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// List the supported output languages
    Languages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Languages => {
            output::print_languages(&mut std::io::stdout())?;
            Ok(())
        }
        Command::Extract {
            file_path,
            language,
            dpi,
            no_color,
        } => extract(file_path, language, dpi, ColorMode(!no_color)).await,
        Command::Explain {
            file_path,
            out_dir,
            language,
            keywords,
            model,
            api_key,
            summary_policy,
            feedback,
            interactive,
            no_color,
        } => {
            let mut config = Config::load();
            apply_overrides(
                &mut config,
                api_key,
                model,
                language.as_deref(),
                keywords,
                summary_policy,
            )?;
            explain(
                &file_path,
                &out_dir,
                &config,
                &feedback,
                interactive,
                ColorMode(!no_color),
            )
            .await
        }
    }
}

/// Logs go to stderr so they never mix with the printed explanation.
/// Quiet by default; `RUST_LOG=narrator_core=info` shows pipeline progress.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// CLI flags override environment and config-file values.
fn apply_overrides(
    config: &mut Config,
    api_key: Option<String>,
    model: Option<String>,
    language: Option<&str>,
    keywords: Vec<String>,
    summary_policy: Option<SummaryPolicy>,
) -> anyhow::Result<()> {
    if let Some(key) = api_key {
        config.gemini_api_key = Some(key);
    }
    if let Some(model) = model {
        config.gemini_model = model;
    }
    if let Some(name) = language {
        config.language = Language::lookup(name).ok_or_else(|| {
            anyhow::anyhow!(
                "Unsupported language '{}'. Run `narrator languages` for the list.",
                name
            )
        })?;
    }
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if !keywords.is_empty() {
        config.keywords = keywords;
    }
    if let Some(policy) = summary_policy {
        config.summary_policy = policy;
    }
    Ok(())
}

fn read_pdf(file_path: &Path) -> anyhow::Result<(String, Vec<u8>)> {
    if !file_path.exists() {
        anyhow::bail!("File not found: {}", file_path.display());
    }
    let bytes = std::fs::read(file_path)?;
    let file_name = file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file_path.display().to_string());
    Ok((file_name, bytes))
}

/// One spinner per pipeline action, updated from the orchestrator's events.
#[derive(Clone)]
struct StageSpinner(Arc<Mutex<ProgressBar>>);

impl StageSpinner {
    fn new() -> Self {
        Self(Arc::new(Mutex::new(ProgressBar::hidden())))
    }

    fn start(&self, message: String) {
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} ({elapsed})") {
            bar.set_style(style);
        }
        bar.set_message(message);
        bar.enable_steady_tick(Duration::from_millis(120));
        if let Ok(mut current) = self.0.lock() {
            *current = bar;
        }
    }

    fn set_message(&self, message: &'static str) {
        if let Ok(current) = self.0.lock() {
            current.set_message(message);
        }
    }

    fn println(&self, line: String) {
        if let Ok(current) = self.0.lock() {
            current.println(line);
        }
    }

    fn finish(&self) {
        if let Ok(current) = self.0.lock() {
            current.finish_and_clear();
        }
    }
}

async fn explain(
    file_path: &Path,
    out_dir: &Path,
    config: &Config,
    feedback: &[String],
    interactive: bool,
    color: ColorMode,
) -> anyhow::Result<()> {
    let (file_name, bytes) = read_pdf(file_path)?;
    std::fs::create_dir_all(out_dir)?;
    tracing::debug!(?config, "resolved configuration");

    let spinner = StageSpinner::new();
    let observer = {
        let spinner = spinner.clone();
        move |event: PipelineEvent| match event {
            PipelineEvent::StageChanged { to, .. } => {
                if let Some(label) = output::stage_label(to) {
                    spinner.set_message(label);
                }
            }
            PipelineEvent::OcrFallback { pages } => {
                spinner.println(output::ocr_notice(&pages, color));
            }
            PipelineEvent::Failed { .. } => {}
        }
    };

    let services = Services::live(config, Arc::new(MupdfBackend::new()));
    let mut orchestrator = Orchestrator::from_services(&services, config).with_observer(observer);

    let mut stdout = std::io::stdout();
    writeln!(stdout, "Explaining {} in {}...", file_name, config.language)?;

    spinner.start(format!("Reading {}", file_name));
    let result = orchestrator.process(file_name, bytes).await;
    spinner.finish();
    let snapshot = result?;
    report(&mut stdout, out_dir, &snapshot, color)?;

    for text in feedback {
        revise(&mut orchestrator, &spinner, text, &mut stdout, out_dir, color).await?;
    }

    if interactive {
        let stdin = std::io::stdin();
        loop {
            write!(stdout, "{}", output::feedback_prompt(color))?;
            stdout.flush()?;

            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 || line.trim().is_empty() {
                break;
            }
            // A failed revision keeps the previous explanation; let the user try again
            if let Err(e) =
                revise(&mut orchestrator, &spinner, line.trim(), &mut stdout, out_dir, color).await
            {
                output::print_error(&mut stdout, &e.to_string(), color)?;
            }
        }
    }
    Ok(())
}

async fn revise(
    orchestrator: &mut Orchestrator,
    spinner: &StageSpinner,
    feedback: &str,
    w: &mut dyn Write,
    out_dir: &Path,
    color: ColorMode,
) -> anyhow::Result<()> {
    writeln!(w)?;
    writeln!(w, "Applying feedback: \"{}\"", feedback)?;
    spinner.start("Revising explanation".to_string());
    let result = orchestrator.submit_feedback(feedback).await;
    spinner.finish();
    let snapshot = result?;
    report(w, out_dir, &snapshot, color)
}

fn report(
    w: &mut dyn Write,
    out_dir: &Path,
    snapshot: &Snapshot,
    color: ColorMode,
) -> anyhow::Result<()> {
    output::print_snapshot(w, snapshot, color)?;
    let written = output::write_artifacts(out_dir, snapshot)?;
    output::print_artifacts(w, &written, color)?;
    Ok(())
}

async fn extract(
    file_path: PathBuf,
    language: Option<String>,
    dpi: Option<u32>,
    color: ColorMode,
) -> anyhow::Result<()> {
    let config = Config::load();
    let (file_name, bytes) = read_pdf(&file_path)?;

    let ocr = TesseractOcr::from_config(&config);
    if !ocr.is_available() {
        tracing::warn!(
            binary = %config.tesseract_path,
            "tesseract not found; scanned pages will be empty"
        );
    }
    let extractor = TextExtractor::new(Arc::new(MupdfBackend::new()), Arc::new(ocr))
        .with_dpi(dpi.unwrap_or(config.ocr_dpi))
        .with_language(language.unwrap_or_else(|| config.tesseract_language().to_string()));

    let spinner = StageSpinner::new();
    spinner.start(format!("Extracting text from {}", file_name));
    let result = tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await?;
    spinner.finish();
    let extracted = result?;

    output::print_extraction(&mut std::io::stdout(), &file_name, &extracted, color)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_repeated_feedback_and_keywords() {
        let cli = Cli::try_parse_from([
            "narrator",
            "explain",
            "paper.pdf",
            "--keywords",
            "energy,cells",
            "-f",
            "simpler",
            "-f",
            "add an example",
            "--summary-policy",
            "keep",
        ])
        .unwrap();
        match cli.command {
            Command::Explain {
                file_path,
                keywords,
                feedback,
                summary_policy,
                out_dir,
                ..
            } => {
                assert_eq!(file_path, PathBuf::from("paper.pdf"));
                assert_eq!(keywords, vec!["energy", "cells"]);
                assert_eq!(feedback, vec!["simpler", "add an example"]);
                assert_eq!(summary_policy, Some(SummaryPolicy::Keep));
                assert_eq!(out_dir, PathBuf::from("."));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn cli_rejects_unknown_policy() {
        let result = Cli::try_parse_from([
            "narrator",
            "explain",
            "paper.pdf",
            "--summary-policy",
            "sometimes",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn overrides_take_precedence() {
        let mut config = Config {
            gemini_model: "from-file".into(),
            ..Config::default()
        };
        apply_overrides(
            &mut config,
            Some("flag-key".into()),
            Some("from-flag".into()),
            Some("ta"),
            vec![" physics ".into(), "".into()],
            Some(SummaryPolicy::Regenerate),
        )
        .unwrap();
        assert_eq!(config.gemini_api_key.as_deref(), Some("flag-key"));
        assert_eq!(config.gemini_model, "from-flag");
        assert_eq!(config.language.name, "Tamil");
        assert_eq!(config.keywords, vec!["physics"]);
        assert_eq!(config.summary_policy, SummaryPolicy::Regenerate);
    }

    #[test]
    fn unknown_language_is_an_error() {
        let mut config = Config::default();
        let err = apply_overrides(&mut config, None, None, Some("Klingon"), vec![], None)
            .unwrap_err();
        assert!(err.to_string().contains("Klingon"));
    }

    #[test]
    fn missing_file_is_reported() {
        let err = read_pdf(Path::new("/definitely/not/here.pdf")).unwrap_err();
        assert!(err.to_string().contains("File not found"));
    }
}
