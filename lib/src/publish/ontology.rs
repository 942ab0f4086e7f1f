use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde_json::json;
use tracing::{debug, Span};

use crate::error::{Chainable, Result};
use crate::graph::Metadata;
use crate::publish::{display_name, Progress, Publication, Site, Stage};
use crate::scan::SourceItem;
use crate::util::{self, PathExt};

/// Publishes one Turtle ontology: renders it as a template, documents it as
/// HTML and extracts its metadata.
#[derive(Debug, Clone)]
pub struct OntologyPublisher {
    site: Arc<Site>,
    namespaces: Arc<FxHashSet<PathBuf>>,
    span: Span,
}

/// Output locations for one ontology.
#[derive(Debug)]
struct Targets {
    /// The rendered Turtle, at the mirrored location.
    turtle: PathBuf,
    backup: PathBuf,
    html: PathBuf,
    alias: PathBuf,
}

impl OntologyPublisher {
    pub fn new(site: Arc<Site>, parent: &Span) -> Self {
        OntologyPublisher {
            site,
            namespaces: Arc::default(),
            span: tracing::debug_span!(parent: parent, "ontology"),
        }
    }

    /// The source folders holding publications, as returned by
    /// [`scan::namespaces()`](crate::scan::namespaces). Only these decide
    /// where aliases go, so output written by earlier runs never does.
    pub fn namespaces(mut self, namespaces: FxHashSet<PathBuf>) -> Self {
        self.namespaces = Arc::new(namespaces);
        self
    }

    fn targets(&self, item: &SourceItem) -> Targets {
        let stem = item.file_stem();
        let out = self.site.output_dir(&item.nssub);

        // A namespace folder named like the ontology already claims
        // `{stem}/` for its own index, so the alias takes a distinct name.
        let sibling = match item.at_root() {
            true => PathBuf::from(stem),
            false => item.nssub.join(stem),
        };

        let alias = match self.namespaces.contains(&sibling) {
            true => out.join(stem).join(format!("{stem}.html")),
            false => out.join(stem).join("index.html"),
        };

        Targets {
            turtle: out.join(&item.file_name),
            backup: out.join(format!("{}.bak", item.file_name)),
            html: out.join(format!("{stem}.html")),
            alias,
        }
    }

    /// Publishes `item`. Failures are recorded in the returned publication.
    pub fn publish(&self, item: &SourceItem) -> Publication {
        let span = tracing::debug_span!(parent: &self.span, "publish", key = %item.key());
        let stem = item.file_stem();
        let name = display_name(item, stem);
        let targets = self.targets(item);

        let mut progress = Progress::new(span);
        let result = self.run(item, &name, &targets, &mut progress);
        Publication {
            key: item.key(),
            folder: item.nssub.to_posix(),
            href: item.nssub.join(format!("{stem}.html")).to_posix(),
            turtle: item.relative_path().to_posix(),
            alias: self.relative(&targets.alias).to_posix(),
            draft: false,
            outcome: progress.finish(result),
            name,
        }
    }

    fn run(
        &self,
        item: &SourceItem,
        name: &str,
        targets: &Targets,
        progress: &mut Progress,
    ) -> Result<Metadata> {
        progress.enter(Stage::Rendering);
        let source = util::read(&item.path)?;
        util::copy(&item.path, &targets.backup)?;

        let template = item.relative_path().to_posix();
        let context = json!({ "name": name, "baseuri": self.site.base });
        let rendered = self.site.sources.render_str(Some(&template), &source, &context)
            .chain_with(|| error! {
                "failed to render ontology as a template",
                "source" => item.path.display(),
            })?;

        util::write(&targets.turtle, rendered)?;
        debug!(path = %targets.turtle.display(), "rendered ontology");

        progress.enter(Stage::Converting);
        let conversion = self.site.converter.convert(&targets.turtle, &self.site.base)?;
        util::write(&targets.html, &conversion.html)?;

        progress.enter(Stage::PostProcessing);
        let metadata = conversion.graph.metadata();

        progress.enter(Stage::Finalizing);
        util::copy(&targets.html, &targets.alias)?;
        for folder in [targets.html.parent(), targets.alias.parent()].into_iter().flatten() {
            self.site.write_stylesheet(folder)?;
        }

        Ok(metadata)
    }

    fn relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(&self.site.output_root).unwrap_or(path)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::Settings;
    use crate::error::Kind;
    use crate::publish::Outcome;
    use crate::scan::{namespaces, IgnoreFilter, Scanner, SourceKind};

    const ONTOLOGY: &str = r#"
        @prefix owl: <http://www.w3.org/2002/07/owl#> .
        @prefix dcterms: <http://purl.org/dc/terms/> .

        <{{ baseuri }}/{{ name }}> a owl:Ontology ;
            dcterms:title "One" ;
            dcterms:modified "2024-01-01" .
    "#;

    fn site(source: &Path, output: &Path) -> Arc<Site> {
        let settings = Settings {
            base_uri: "https://example.org/onto/".into(),
            source: source.into(),
            output: Some(output.into()),
            ..Settings::default()
        };

        Arc::new(Site::new(&settings).unwrap())
    }

    fn scan(root: &Path) -> Vec<SourceItem> {
        Scanner::new(root, IgnoreFilter::default(), &Span::none()).scan().unwrap()
    }

    fn item_at<'a>(items: &'a [SourceItem], key: &str) -> &'a SourceItem {
        items.iter().find(|i| i.key() == key).unwrap()
    }

    #[test]
    fn publishes_and_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::create_dir_all(root.join("src/sub/nested")).unwrap();
        fs::create_dir_all(root.join("src/one")).unwrap();
        fs::write(root.join("src/one.ttl"), ONTOLOGY).unwrap();
        fs::write(root.join("src/sub/nested.ttl"), ONTOLOGY).unwrap();
        fs::write(root.join("src/sub/nested/inner.ttl"), ONTOLOGY).unwrap();

        let site = site(&root.join("src"), &root.join("out"));
        let items = scan(&root.join("src"));
        let publisher = OntologyPublisher::new(site, &Span::none()).namespaces(namespaces(&items));
        assert!(items.iter().all(|i| i.kind == SourceKind::Ontology));

        // `src/one/` holds no sources, so it does not claim the index.
        let one = publisher.publish(item_at(&items, "./one.ttl"));
        assert_eq!(one.name, "one");
        assert_eq!(one.href, "one.html");
        assert_eq!(one.alias, "one/index.html");
        assert_eq!(one.outcome, Outcome::Success(Metadata {
            title: Some("One".into()),
            modified: Some("2024-01-01".into()),
        }));

        let out = root.join("out");
        let rendered = fs::read_to_string(out.join("one.ttl")).unwrap();
        assert!(rendered.contains("<https://example.org/onto/one>"));
        assert_eq!(fs::read_to_string(out.join("one.ttl.bak")).unwrap(), ONTOLOGY);
        assert!(out.join("one.html").is_file());
        assert!(out.join("one/index.html").is_file());
        assert!(out.join("one/style.css").is_file());
        assert!(out.join("style.css").is_file());

        let nested = publisher.publish(item_at(&items, "sub/nested.ttl"));
        assert_eq!(nested.name, "sub/nested");
        assert!(nested.is_success());
        let rendered = fs::read_to_string(out.join("sub/nested.ttl")).unwrap();
        assert!(rendered.contains("<https://example.org/onto/sub/nested>"));
        assert!(out.join("sub/nested/nested.html").is_file());
        assert_eq!(nested.alias, "sub/nested/nested.html");
    }

    #[test]
    fn in_place_aliases_are_stable() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("one.ttl"), ONTOLOGY).unwrap();

        let site = site(&root, &root);
        for _ in 0..2 {
            let items = scan(&root);
            let publisher = OntologyPublisher::new(site.clone(), &Span::none()).namespaces(namespaces(&items));
            let one = publisher.publish(item_at(&items, "./one.ttl"));
            assert_eq!(one.alias, "one/index.html");
            assert!(root.join("one/index.html").is_file());
            assert!(!root.join("one/one.html").exists());
        }
    }

    #[test]
    fn malformed_turtle_fails_in_conversion() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("bad.ttl"), "<https://x.org/a> a <").unwrap();

        let site = site(&root, &root);
        let publication = OntologyPublisher::new(site, &Span::none()).publish(&scan(&root)[0]);
        let failure = publication.outcome.failure().unwrap();
        assert_eq!(failure.kind, Kind::Conversion);
        assert_eq!(failure.stage, Stage::Converting);
        assert!(!root.join("bad.html").exists());
        assert!(root.join("bad.ttl.bak").is_file());
    }

    #[test]
    fn template_errors_fail_in_rendering() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("bad.ttl"), "{% if %}").unwrap();

        let site = site(&root, &root);
        let publication = OntologyPublisher::new(site, &Span::none()).publish(&scan(&root)[0]);
        let failure = publication.outcome.failure().unwrap();
        assert_eq!(failure.kind, Kind::Render);
        assert_eq!(failure.stage, Stage::Rendering);
    }
}
