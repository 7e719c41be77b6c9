//! `config.toml` settings.
//!
//! Problems with the file are returned as warnings; the CLI falls back to
//! defaults and keeps going.

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const MIN_PRECISION: usize = 1;
const MAX_PRECISION: usize = 17;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct SettingsFile {
    sections: Option<bool>,
    precision: Option<usize>,
    functions: Option<Vec<PathBuf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
    /// Only calculate inside ```` ```math ```` fences.
    pub sections: bool,
    /// Significant digits for printed numbers.
    pub precision: Option<usize>,
    /// Extra Rhai function files, relative paths resolved against the
    /// config file's directory.
    pub functions: Vec<PathBuf>,
}

/// Platform config directory (`~/.config/livesheet` on Linux).
pub fn config_dir() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "livesheet")?;
    Some(proj.config_dir().to_path_buf())
}

fn user_config_path() -> Option<PathBuf> {
    let mut path = config_dir()?;
    path.push("config.toml");
    Some(path)
}

/// Load settings from `config_file`, or from the user config path when
/// none is given. A missing default file is not a warning.
pub fn load_settings(config_file: Option<&PathBuf>) -> (Settings, Vec<String>) {
    let mut warnings: Vec<String> = Vec::new();
    let Some(path) = config_file.cloned().or_else(user_config_path) else {
        return (Settings::default(), warnings);
    };

    if !path.exists() {
        if config_file.is_some() {
            warnings.push(format!("Config file not found: {}", path.display()));
        }
        return (Settings::default(), warnings);
    }

    let file = match read_settings_file(&path) {
        Ok(file) => file,
        Err(warning) => {
            warnings.push(warning);
            return (Settings::default(), warnings);
        }
    };

    let precision = match file.precision {
        Some(p) if !(MIN_PRECISION..=MAX_PRECISION).contains(&p) => {
            warnings.push(format!(
                "Ignoring precision {} in {}: expected {}..={}",
                p,
                path.display(),
                MIN_PRECISION,
                MAX_PRECISION
            ));
            None
        }
        other => other,
    };

    let base = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let functions = file
        .functions
        .unwrap_or_default()
        .into_iter()
        .map(|f| if f.is_relative() { base.join(f) } else { f })
        .collect();

    let settings = Settings {
        sections: file.sections.unwrap_or(false),
        precision,
        functions,
    };
    (settings, warnings)
}

fn read_settings_file(path: &Path) -> Result<SettingsFile, String> {
    let meta = std::fs::metadata(path)
        .map_err(|err| format!("Failed to read metadata for {}: {}", path.display(), err))?;
    if meta.len() > MAX_CONFIG_FILE_BYTES {
        return Err(format!(
            "Refusing to read {}: file too large ({} bytes, max {})",
            path.display(),
            meta.len(),
            MAX_CONFIG_FILE_BYTES
        ));
    }
    let content = std::fs::read_to_string(path)
        .map_err(|err| format!("Failed to read {}: {}", path.display(), err))?;
    toml::from_str::<SettingsFile>(&content)
        .map_err(|err| format!("Failed to parse {}: {}", path.display(), err))
}
