//! Site-level pages and cross-artifact fixups, run once every item has been
//! published.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn, Span};

use crate::batch::Batch;
use crate::error::{Chainable, Result};
use crate::html::{set_describedby, Dom};
use crate::publish::{Failure, Outcome, Publication, Site, Stage};
use crate::scan::strip_draft;
use crate::util::{self, PathExt};

/// Marks the start of a vocabulary merged into an ontology's Turtle.
const MERGE_MARKER: &str = "# merged from ";

#[derive(Debug, Clone)]
pub struct Composer {
    site: Arc<Site>,
    span: Span,
}

fn file_stem(path: &str) -> &str {
    Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

/// `existing` with the block merged from `source` replaced by `addition`,
/// or `addition` appended when there is no such block yet.
fn splice(existing: &str, source: &str, addition: &str) -> String {
    let marker = format!("{MERGE_MARKER}{source}");
    let kept = match existing.find(&marker) {
        Some(start) => {
            let rest = start + marker.len();
            let end = existing[rest..].find(&format!("\n{MERGE_MARKER}")).map_or(existing.len(), |i| rest + i);
            format!("{}{}", &existing[..start], &existing[end..])
        }
        None => existing.to_string(),
    };

    format!("{}\n\n{marker}\n{}\n", kept.trim_end(), addition.trim())
}

impl Composer {
    pub fn new(site: Arc<Site>, parent: &Span) -> Self {
        Composer { site, span: tracing::debug_span!(parent: parent, "compose") }
    }

    /// Runs every composition step over the finished `batch`: merges, then
    /// the index pages, then `describedby` links.
    ///
    /// A vocabulary that cannot be merged is marked failed in `batch` and
    /// the remaining steps still run. Index page failures are returned once
    /// every step was attempted.
    pub fn compose(&self, batch: &mut Batch) -> Result<()> {
        let _span = self.span.enter();
        let merged = self.merge(batch);
        let index = self.render_index(batch);
        let pages = self.render_namespaces(batch);
        let linked = self.inject_describedby(batch);
        let pages = match (index, pages) {
            (Ok(_), Ok(pages)) => pages,
            (Ok(_), Err(e)) | (Err(e), Ok(_)) => return Err(e),
            (Err(e1), Err(e2)) => return Err(e1.chain(e2)),
        };

        info!(merged, pages, linked, "composed site");
        Ok(())
    }

    /// Appends each vocabulary's Turtle to the ontology Turtle in the same
    /// folder and removes the vocabulary's own file. Returns the number of
    /// vocabularies merged.
    ///
    /// The ontology is the one whose stem matches the vocabulary name, or
    /// the folder's only ontology. Vocabularies without one are left alone.
    /// A vocabulary that fails to merge is recorded as failed.
    pub fn merge(&self, batch: &mut Batch) -> usize {
        let Batch { ontologies, vocabularies, failed_vocabularies, .. } = batch;
        let mut merged = 0;
        for vocabulary in vocabularies.values_mut().filter(|v| v.is_success()) {
            let siblings: Vec<&Publication> = ontologies.values()
                .filter(|o| o.is_success() && o.folder == vocabulary.folder)
                .collect();

            let name = strip_draft(file_stem(&vocabulary.key));
            let target = siblings.iter()
                .find(|o| file_stem(&o.key) == name)
                .or_else(|| (siblings.len() == 1).then(|| &siblings[0]));

            let Some(ontology) = target else {
                continue;
            };

            if let Err(e) = self.merge_into(vocabulary, ontology) {
                warn!(vocabulary = %vocabulary.key, "failed to merge vocabulary: {}", e.summary());
                vocabulary.outcome = Outcome::Failure(Failure {
                    kind: e.kind(),
                    stage: Stage::Finalizing,
                    message: e.summary(),
                });

                failed_vocabularies.insert(vocabulary.key.clone());
                continue;
            }

            debug!(vocabulary = %vocabulary.key, ontology = %ontology.key, "merged vocabulary");
            vocabulary.turtle = ontology.turtle.clone();
            merged += 1;
        }

        merged
    }

    fn merge_into(&self, vocabulary: &Publication, ontology: &Publication) -> Result<()> {
        let root = &self.site.output_root;
        let source = root.join(&vocabulary.turtle);
        let destination = root.join(&ontology.turtle);
        let source_name = source.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let combined = splice(&util::read(&destination)?, &source_name, &util::read(&source)?);
        util::write(&destination, combined)?;

        // Signposting now has to point at the merged document.
        for page in [&vocabulary.href, &vocabulary.alias] {
            let folder = Path::new(page.as_str()).parent().unwrap_or(Path::new(""));
            let href = Path::new(&ontology.turtle).href_from(folder);
            let path = root.join(page);
            if let Some(html) = set_describedby::<Dom>(&util::read(&path)?, &href)? {
                util::write(&path, html)?;
            }
        }

        std::fs::remove_file(&source).chain_with(|| error! {
            "failed to remove merged vocabulary",
            "path" => source.display(),
        })
    }

    /// Renders `index.html` at the output root, listing every publication.
    pub fn render_index(&self, batch: &Batch) -> Result<()> {
        let context = json!({
            "baseuri": self.site.base,
            "ontologies": batch.ontologies.values().collect::<Vec<_>>(),
            "vocabularies": batch.vocabularies.values().collect::<Vec<_>>(),
        });

        let html = self.site.templates.render("index.html", &context)?;
        util::write(&self.site.output_root.join("index.html"), html)?;
        self.site.write_stylesheet(&self.site.output_root)
    }

    /// Renders `{folder}/index.html` for every non-root folder holding a
    /// publication. Returns the number of pages.
    pub fn render_namespaces(&self, batch: &Batch) -> Result<usize> {
        let mut folders: BTreeMap<&str, (Vec<Value>, Vec<Value>)> = BTreeMap::new();
        let records = batch.ontologies.values().map(|p| (p, true))
            .chain(batch.vocabularies.values().map(|p| (p, false)))
            .filter(|(p, _)| p.folder != ".");

        for (publication, is_ontology) in records {
            let record = Self::relative_record(publication)?;
            let (ontologies, vocabularies) = folders.entry(&publication.folder).or_default();
            match is_ontology {
                true => ontologies.push(record),
                false => vocabularies.push(record),
            }
        }

        for (folder, (ontologies, vocabularies)) in &folders {
            let context = json!({
                "baseuri": self.site.base,
                "folder": folder,
                "root": Path::new(".").href_from(folder),
                "ontologies": ontologies,
                "vocabularies": vocabularies,
            });

            let html = self.site.templates.render("namespace.html", &context)?;
            util::write(&self.site.output_root.join(folder).join("index.html"), html)?;
        }

        Ok(folders.len())
    }

    /// `publication` as a template value, with links relative to its folder.
    fn relative_record(publication: &Publication) -> Result<Value> {
        let mut record = serde_json::to_value(publication)?;
        let folder = Path::new(&publication.folder);
        record["href"] = Path::new(&publication.href).href_from(folder).into();
        record["turtle"] = Path::new(&publication.turtle).href_from(folder).into();
        Ok(record)
    }

    /// Links the page of every published ontology to its Turtle document.
    /// Pages the run did not produce are never touched. A page that cannot
    /// be read or written is skipped with a warning. Returns the number of
    /// pages changed.
    pub fn inject_describedby(&self, batch: &Batch) -> usize {
        let root = &self.site.output_root;
        let mut changed = 0;
        for ontology in batch.ontologies.values().filter(|o| o.is_success()) {
            let page = root.join(&ontology.href);
            let folder = Path::new(&ontology.href).parent().unwrap_or(Path::new(""));
            let href = Path::new(&ontology.turtle).href_from(folder);
            if !page.is_file() || !root.join(&ontology.turtle).is_file() {
                continue;
            }

            let linked = util::read(&page)
                .and_then(|html| set_describedby::<Dom>(&html, &href))
                .and_then(|html| html.map(|html| util::write(&page, html)).transpose());

            match linked {
                Ok(Some(())) => {
                    debug!(page = %page.display(), "linked page to its Turtle");
                    changed += 1;
                }
                Ok(None) => {}
                Err(e) => warn!(page = %page.display(), "failed to link page: {}", e.summary()),
            }
        }

        changed
    }
}
