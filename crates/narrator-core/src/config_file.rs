use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api_keys: Option<ApiKeysConfig>,
    pub generation: Option<GenerationConfig>,
    pub speech: Option<SpeechConfig>,
    pub ocr: Option<OcrConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiKeysConfig {
    pub gemini_api_key: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: Option<u64>,
    /// Language name or ISO code, e.g. "Hindi" or "hi".
    pub language: Option<String>,
    pub keywords: Option<Vec<String>>,
    /// "keep", "regenerate" or "follow".
    pub summary_policy: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechConfig {
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrConfig {
    pub dpi: Option<u32>,
    pub language: Option<String>,
    pub tesseract_path: Option<String>,
}

/// Platform config directory path: `<config_dir>/narrator/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("narrator").join("config.toml"))
}

/// Load config by cascading CWD `.narrator.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".narrator.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    fn pick<S, T: Clone>(
        overlay: &Option<S>,
        base: &Option<S>,
        f: impl Fn(&S) -> Option<T>,
    ) -> Option<T> {
        overlay
            .as_ref()
            .and_then(&f)
            .or_else(|| base.as_ref().and_then(&f))
    }

    ConfigFile {
        api_keys: Some(ApiKeysConfig {
            gemini_api_key: pick(&overlay.api_keys, &base.api_keys, |a| {
                a.gemini_api_key.clone()
            }),
        }),
        generation: Some(GenerationConfig {
            model: pick(&overlay.generation, &base.generation, |g| g.model.clone()),
            base_url: pick(&overlay.generation, &base.generation, |g| g.base_url.clone()),
            temperature: pick(&overlay.generation, &base.generation, |g| g.temperature),
            timeout_secs: pick(&overlay.generation, &base.generation, |g| g.timeout_secs),
            language: pick(&overlay.generation, &base.generation, |g| g.language.clone()),
            keywords: pick(&overlay.generation, &base.generation, |g| g.keywords.clone()),
            summary_policy: pick(&overlay.generation, &base.generation, |g| {
                g.summary_policy.clone()
            }),
        }),
        speech: Some(SpeechConfig {
            base_url: pick(&overlay.speech, &base.speech, |s| s.base_url.clone()),
        }),
        ocr: Some(OcrConfig {
            dpi: pick(&overlay.ocr, &base.ocr, |o| o.dpi),
            language: pick(&overlay.ocr, &base.ocr, |o| o.language.clone()),
            tesseract_path: pick(&overlay.ocr, &base.ocr, |o| o.tesseract_path.clone()),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_round_trip_toml() {
        let config = ConfigFile {
            generation: Some(GenerationConfig {
                keywords: Some(vec!["energy".to_string(), "cells".to_string()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: ConfigFile = toml::from_str(&toml_str).unwrap();
        assert_eq!(
            parsed.generation.unwrap().keywords.unwrap(),
            vec!["energy", "cells"]
        );
    }

    #[test]
    fn absent_fields_deserialize_as_none() {
        let toml_str = "[ocr]\ndpi = 200\n";
        let parsed: ConfigFile = toml::from_str(toml_str).unwrap();
        let ocr = parsed.ocr.unwrap();
        assert_eq!(ocr.dpi, Some(200));
        assert!(ocr.language.is_none());
        assert!(parsed.generation.is_none());
    }

    #[test]
    fn merge_overlay_wins() {
        let base = ConfigFile {
            generation: Some(GenerationConfig {
                model: Some("base-model".to_string()),
                language: Some("Hindi".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let overlay = ConfigFile {
            generation: Some(GenerationConfig {
                model: Some("overlay-model".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let merged = merge(base, overlay).generation.unwrap();
        assert_eq!(merged.model.unwrap(), "overlay-model");
        assert_eq!(merged.language.unwrap(), "Hindi");
    }

    #[test]
    fn merge_base_preserved_when_overlay_absent() {
        let base = ConfigFile {
            api_keys: Some(ApiKeysConfig {
                gemini_api_key: Some("base-key".to_string()),
            }),
            ..Default::default()
        };
        let merged = merge(base, ConfigFile::default());
        assert_eq!(merged.api_keys.unwrap().gemini_api_key.unwrap(), "base-key");
    }

    #[test]
    fn written_file_loads_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = ConfigFile {
            speech: Some(SpeechConfig {
                base_url: Some("http://localhost:8080".to_string()),
            }),
            ..Default::default()
        };
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();
        let loaded = load_from_path(&path).unwrap();
        assert_eq!(loaded.speech.unwrap().base_url.unwrap(), "http://localhost:8080");
    }

    #[test]
    fn unparseable_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[generation\nmodel = ").unwrap();
        assert!(load_from_path(&path).is_none());
        assert!(load_from_path(&dir.path().join("missing.toml")).is_none());
    }
}
