use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Chainable, Result};
use crate::scan::{IgnoreFilter, PASSTHROUGH};

/// Name of the optional settings file read from the source root.
pub const SETTINGS_FILE: &str = "pages.toml";

/// Everything a [`Pipeline`](crate::pipeline::Pipeline) run needs to know.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct Settings {
    /// Base URI the site is published under, without a trailing `/`.
    pub base_uri: String,
    /// The folder scanned for sources.
    pub source: PathBuf,
    /// Where output goes. Defaults to `source`.
    pub output: Option<PathBuf>,
    /// Folder overriding the built-in templates and stylesheet.
    pub templates: Option<PathBuf>,
    /// Comma-separated folder name prefixes to skip.
    pub ignore_folders: String,
    /// Normalize vocabulary identifiers to camelCase.
    pub camel_case: bool,
    /// Publish items on the rayon thread pool instead of one by one.
    pub parallel: bool,
    /// File names copied to the output verbatim.
    pub passthrough: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_uri: String::new(),
            source: PathBuf::from("."),
            output: None,
            templates: None,
            ignore_folders: String::new(),
            camel_case: true,
            parallel: false,
            passthrough: PASSTHROUGH.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Settings {
    /// Reads settings from a TOML file. Keys missing from the file keep
    /// their defaults.
    pub fn from_toml(path: &Path) -> Result<Settings> {
        let string = crate::util::read(path)?;
        toml::from_str(&string).chain_with(|| error! {
            "invalid settings file",
            "path" => path.display(),
        })
    }

    /// Reads [`SETTINGS_FILE`] from `source` if it exists, else the defaults.
    /// `source` is set either way.
    pub fn discover(source: &Path) -> Result<Settings> {
        let file = source.join(SETTINGS_FILE);
        let mut settings = match file.is_file() {
            true => Settings::from_toml(&file)?,
            false => Settings::default(),
        };

        settings.source = source.to_path_buf();
        Ok(settings)
    }

    pub fn output_root(&self) -> &Path {
        self.output.as_deref().unwrap_or(&self.source)
    }

    pub fn ignore_filter(&self) -> IgnoreFilter {
        IgnoreFilter::parse(&self.ignore_folders)
    }

    /// The base URI without trailing slashes.
    pub fn base(&self) -> &str {
        self.base_uri.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_partial_settings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), r#"
            base-uri = "https://w3id.org/example/"
            ignore-folders = "tmp, drafts"
            camel-case = false
        "#).unwrap();

        let settings = Settings::discover(dir.path()).unwrap();
        assert_eq!(settings.base(), "https://w3id.org/example");
        assert!(!settings.camel_case);
        assert!(!settings.parallel);
        assert_eq!(settings.output_root(), dir.path());
        assert!(settings.ignore_filter().matches("tmp"));
        assert_eq!(settings.passthrough, PASSTHROUGH);
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::discover(dir.path()).unwrap();
        assert_eq!(settings, Settings { source: dir.path().into(), ..Settings::default() });
    }

    #[test]
    fn rejects_unknown_types() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(SETTINGS_FILE), "parallel = \"yes\"").unwrap();
        assert!(Settings::discover(dir.path()).is_err());
    }
}
