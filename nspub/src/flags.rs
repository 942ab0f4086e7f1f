use std::path::PathBuf;

xflags::xflags! {
    /// Publishes a folder of Turtle ontologies and CSV vocabularies as a
    /// static site. Every argument falls back to the environment, then to
    /// `pages.toml` in the input folder.
    cmd nspub {
        /// Base URI the site is published under. Falls back to `BASE_URI`.
        optional base_uri: String
        /// Folder to scan. Defaults to the current folder.
        optional input: PathBuf
        /// Folder to write to. Defaults to the input folder.
        optional output: PathBuf
        /// YAML logging configuration. Falls back to `LOGCONF`.
        optional logconf: PathBuf
        /// Folder overriding the built-in templates. Falls back to `TEMPLATES`.
        optional --templates dir: PathBuf
        /// Comma-separated folder name prefixes to skip. Falls back to
        /// `IGNORE_FOLDERS`.
        optional --ignore-folders list: String
        /// Keep vocabulary identifiers as written. Overrides `AUTO_CAMEL_CASE`.
        optional --no-camel-case
        /// Publish items in parallel.
        optional --parallel
    }
}
