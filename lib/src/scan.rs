use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tracing::{debug, warn, Span};

use crate::error::Result;
use crate::util::PathExt;

/// File names copied verbatim to the output when no others are configured.
pub const PASSTHROUGH: &[&str] = &["CNAME", ".nojekyll"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Ontology,
    Vocabulary,
    Passthrough,
}

/// One file found by the [`Scanner`].
#[derive(Debug, Clone)]
pub struct SourceItem {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Folder of the file relative to the scan root; `.` for the root itself.
    pub nssub: PathBuf,
    pub file_name: String,
    pub kind: SourceKind,
    pub draft: bool,
}

impl SourceItem {
    /// The namespace-relative key of this item: `{nssub}/{file_name}`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.nssub.to_posix(), self.file_name)
    }

    /// File name without the extension.
    pub fn file_stem(&self) -> &str {
        match self.file_name.rsplit_once('.') {
            Some((left, _)) if !left.is_empty() => left,
            _ => &self.file_name,
        }
    }

    /// The extension, if any.
    pub fn file_ext(&self) -> Option<&str> {
        match self.file_name.rsplit_once('.') {
            Some((left, right)) if !left.is_empty() => Some(right),
            _ => None,
        }
    }

    /// Path relative to the scan root.
    pub fn relative_path(&self) -> PathBuf {
        self.nssub.join(&self.file_name)
    }

    /// `true` if `nssub` is the scan root.
    pub fn at_root(&self) -> bool {
        self.nssub == Path::new(".")
    }
}

/// Whether a file stem follows the draft naming convention.
pub fn is_draft(stem: &str) -> bool {
    stem.ends_with("_draft") || stem.ends_with("-draft")
}

/// The stem without its draft suffix.
pub fn strip_draft(stem: &str) -> &str {
    stem.strip_suffix("_draft")
        .or_else(|| stem.strip_suffix("-draft"))
        .unwrap_or(stem)
}

/// Every folder, relative to the scan root, holding a published source
/// directly or in a subfolder. The root itself is not included.
pub fn namespaces<'a, I>(items: I) -> FxHashSet<PathBuf>
    where I: IntoIterator<Item = &'a SourceItem>
{
    let mut folders = FxHashSet::default();
    for item in items.into_iter().filter(|i| i.kind != SourceKind::Passthrough) {
        let ancestors = item.nssub.ancestors()
            .filter(|folder| !folder.as_os_str().is_empty() && *folder != Path::new("."));

        folders.extend(ancestors.map(Path::to_path_buf));
    }

    folders
}

/// Folder names to skip while scanning.
///
/// A folder is skipped when its name equals, or merely starts with, one of
/// the patterns: `tmp` skips `tmp/` as well as `tmp-old/`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreFilter {
    patterns: Vec<String>,
}

impl IgnoreFilter {
    /// Parses a comma-separated list, ignoring blank entries.
    pub fn parse(list: &str) -> Self {
        IgnoreFilter::new(list.split(','))
    }

    pub fn new<I, S>(patterns: I) -> Self
        where I: IntoIterator<Item = S>, S: AsRef<str>
    {
        let patterns = patterns.into_iter()
            .map(|p| p.as_ref().trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();

        IgnoreFilter { patterns }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, component: &str) -> bool {
        self.patterns.iter().any(|p| component.starts_with(p.as_str()))
    }

    /// `true` if any folder component of `relative` matches.
    pub fn ignores(&self, relative: &Path) -> bool {
        relative.components()
            .filter_map(|c| c.as_os_str().to_str())
            .any(|c| self.matches(c))
    }
}

#[derive(Debug)]
pub struct Scanner {
    root: PathBuf,
    ignore: Arc<IgnoreFilter>,
    excluded: Arc<Vec<PathBuf>>,
    passthrough: Vec<String>,
    span: Span,
}

impl Scanner {
    pub fn new<P: AsRef<Path>>(root: P, ignore: IgnoreFilter, parent: &Span) -> Self {
        Scanner {
            root: root.as_ref().to_path_buf(),
            ignore: Arc::new(ignore),
            excluded: Arc::new(vec![]),
            passthrough: PASSTHROUGH.iter().map(|s| s.to_string()).collect(),
            span: tracing::debug_span!(parent: parent, "scan"),
        }
    }

    /// Never descend into `folder`, typically the output or templates folder
    /// when it lives inside the scan root.
    pub fn exclude<P: AsRef<Path>>(mut self, folder: P) -> Self {
        let folder = folder.as_ref();
        let folder = folder.canonicalize().unwrap_or_else(|_| folder.to_path_buf());
        if folder != self.root {
            Arc::make_mut(&mut self.excluded).push(folder);
        }

        self
    }

    pub fn passthrough<I, S>(mut self, names: I) -> Self
        where I: IntoIterator<Item = S>, S: Into<String>
    {
        self.passthrough = names.into_iter().map(Into::into).collect();
        self
    }

    fn classify(&self, file_name: &str) -> Option<SourceKind> {
        if self.passthrough.iter().any(|p| p == file_name) {
            return Some(SourceKind::Passthrough);
        }

        let (stem, ext) = file_name.rsplit_once('.').filter(|(stem, _)| !stem.is_empty())?;
        match ext {
            // Vocabulary artifacts of an in-place run are not sources.
            "ttl" if stem.ends_with("_vocab") || stem.ends_with("_vocab_draft") => None,
            "ttl" => Some(SourceKind::Ontology),
            "csv" => Some(SourceKind::Vocabulary),
            _ => None,
        }
    }

    /// Walks the tree, in sorted order, following symbolic links.
    pub fn scan(&self) -> Result<Vec<SourceItem>> {
        let _span = self.span.enter();
        if !self.root.is_dir() {
            return err! {
                "source folder must be an existing directory",
                "source folder" => self.root.display(),
            };
        }

        let ignore = self.ignore.clone();
        let excluded = self.excluded.clone();
        let walker = jwalk::WalkDir::new(&self.root)
            .follow_links(true)
            .skip_hidden(false)
            .sort(true)
            .process_read_dir(move |_, _, _, children| {
                children.retain(|child| match child {
                    Ok(e) if e.file_type.is_dir() => {
                        let name = e.file_name.to_string_lossy();
                        !ignore.matches(&name) && !excluded.iter().any(|p| *p == e.path())
                    },
                    _ => true,
                });
            });

        let mut items = vec![];
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable entry: {e}");
                    continue;
                }
            };

            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let file_name = entry.file_name.to_string_lossy().into_owned();
            let Some(kind) = self.classify(&file_name) else {
                continue;
            };

            let nssub = match entry.parent_path.strip_prefix(&self.root) {
                Ok(sub) if sub.as_os_str().is_empty() => PathBuf::from("."),
                Ok(sub) => sub.to_path_buf(),
                Err(_) => {
                    warn!(path = %path.display(), "entry escaped the source folder");
                    continue;
                }
            };

            let stem = file_name.rsplit_once('.').map_or(&*file_name, |(stem, _)| stem);
            let item = SourceItem {
                draft: kind == SourceKind::Vocabulary && is_draft(stem),
                path,
                nssub,
                file_name: file_name.clone(),
                kind,
            };

            debug!(key = %item.key(), kind = ?item.kind, "found source");
            items.push(item);
        }

        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn touch(root: &Path, path: &str) {
        let path = root.join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "").unwrap();
    }

    #[test]
    fn ignore_patterns() {
        let filter = IgnoreFilter::parse(" should-ignore, ,tmp");
        assert!(filter.matches("should-ignore"));
        assert!(filter.matches("should-ignore-too"));
        assert!(filter.matches("tmpfiles"));
        assert!(!filter.matches("should-process"));
        assert!(filter.ignores(Path::new("a/tmp/b")));
        assert!(!filter.ignores(Path::new("a/b")));
        assert!(IgnoreFilter::parse("").is_empty());
        assert!(IgnoreFilter::parse(" , ").is_empty());
    }

    #[test]
    fn drafts() {
        assert!(is_draft("terms_draft"));
        assert!(is_draft("terms-draft"));
        assert!(!is_draft("drafts"));
        assert_eq!(strip_draft("terms_draft"), "terms");
        assert_eq!(strip_draft("terms"), "terms");
    }

    #[test]
    fn scans_and_classifies() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root, "onto-one.ttl");
        touch(&root, "CNAME");
        touch(&root, "notes.txt");
        touch(&root, "sub/onto-two.ttl");
        touch(&root, "sub/terms_draft.csv");
        touch(&root, "sub/terms_vocab.ttl");
        touch(&root, "should-ignore/ignored.ttl");
        touch(&root, "should-ignore-too/ignored.ttl");
        touch(&root, "deep/should-ignore/ignored.csv");
        touch(&root, "out/onto-one.ttl");

        let scanner = Scanner::new(&root, IgnoreFilter::parse("should-ignore"), &Span::none())
            .exclude(root.join("out"));

        let items = scanner.scan().unwrap();
        let keys: Vec<_> = items.iter().map(|i| i.key()).collect();
        assert_eq!(keys.len(), 4, "{keys:?}");
        assert!(keys.contains(&"./onto-one.ttl".to_string()));
        assert!(keys.contains(&"./CNAME".to_string()));
        assert!(keys.contains(&"sub/onto-two.ttl".to_string()));
        assert!(keys.contains(&"sub/terms_draft.csv".to_string()));

        let terms = items.iter().find(|i| i.file_name == "terms_draft.csv").unwrap();
        assert_eq!(terms.kind, SourceKind::Vocabulary);
        assert!(terms.draft);
        assert_eq!(terms.file_stem(), "terms_draft");
        assert_eq!(terms.file_ext(), Some("csv"));
        assert_eq!(terms.relative_path(), Path::new("sub/terms_draft.csv"));

        let cname = items.iter().find(|i| i.file_name == "CNAME").unwrap();
        assert_eq!(cname.kind, SourceKind::Passthrough);
        assert!(cname.at_root());
    }

    #[test]
    fn namespaces_are_source_folders() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        touch(&root, "one.ttl");
        touch(&root, "a/b/terms.csv");
        touch(&root, "c/CNAME");
        touch(&root, "one/index.html");

        let items = Scanner::new(&root, IgnoreFilter::default(), &Span::none()).scan().unwrap();
        let mut folders: Vec<_> = namespaces(&items).into_iter().collect();
        folders.sort();
        assert_eq!(folders, [Path::new("a"), Path::new("a/b")]);
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let scanner = Scanner::new(dir.path().join("nope"), IgnoreFilter::default(), &Span::none());
        assert!(scanner.scan().is_err());
    }
}
