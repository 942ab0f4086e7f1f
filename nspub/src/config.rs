use std::path::{Path, PathBuf};

use ontopages::error::{Kind, Result};
use ontopages::Settings;

use crate::flags::Nspub;

pub const BASE_URI: &str = "BASE_URI";
pub const LOGCONF: &str = "LOGCONF";
pub const IGNORE_FOLDERS: &str = "IGNORE_FOLDERS";
pub const AUTO_CAMEL_CASE: &str = "AUTO_CAMEL_CASE";
pub const TEMPLATES: &str = "TEMPLATES";

/// Reads `key` from the process environment. Blank values count as unset.
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => ontopages::err! {
            Kind::Other; "expected a boolean",
            "variable" => key,
            "value" => value,
        },
    }
}

/// The logging configuration file, if any was named.
pub fn logconf(flags: &Nspub, env: impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    flags.logconf.clone().or_else(|| env(LOGCONF).map(PathBuf::from))
}

/// Resolves the run's settings. Each value comes from, in order: `flags`,
/// `env`, `pages.toml` in the input folder, the defaults.
pub fn settings(flags: &Nspub, env: impl Fn(&str) -> Option<String>) -> Result<Settings> {
    let input = flags.input.as_deref().unwrap_or(Path::new("."));
    let mut settings = Settings::discover(input)?;

    // Folders named in the settings file are relative to the input folder.
    settings.output = settings.output.map(|path| input.join(path));
    settings.templates = settings.templates.map(|path| input.join(path));

    // An empty positional base URI lets later positionals be given without it.
    let base_uri = flags.base_uri.clone().filter(|uri| !uri.is_empty());
    if let Some(base_uri) = base_uri.or_else(|| env(BASE_URI)) {
        settings.base_uri = base_uri;
    }

    if let Some(output) = &flags.output {
        settings.output = Some(output.clone());
    }

    if let Some(templates) = flags.templates.clone().or_else(|| env(TEMPLATES).map(PathBuf::from)) {
        settings.templates = Some(templates);
    }

    if let Some(list) = flags.ignore_folders.clone().or_else(|| env(IGNORE_FOLDERS)) {
        settings.ignore_folders = list;
    }

    if flags.no_camel_case {
        settings.camel_case = false;
    } else if let Some(value) = env(AUTO_CAMEL_CASE) {
        settings.camel_case = parse_bool(AUTO_CAMEL_CASE, &value)?;
    }

    settings.parallel |= flags.parallel;
    Ok(settings)
}
