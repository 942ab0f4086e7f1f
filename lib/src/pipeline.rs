use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn, Span};

use crate::batch::{Aggregator, Batch, BatchError};
use crate::compose::Composer;
use crate::config::Settings;
use crate::error::{Chainable, Error, Kind, Result};
use crate::publish::{OntologyPublisher, Site, VocabularyPublisher};
use crate::scan::{self, Scanner, SourceItem, SourceKind};
use crate::util;

/// Why a run did not succeed.
#[derive(Debug)]
pub enum RunError {
    /// The run could not proceed: nothing or only part of the site was
    /// written.
    Fatal(Error),
    /// Every item was attempted but some failed. Carries the full batch.
    Batch(BatchError),
    /// Every item was attempted but the site pages could not be composed.
    Compose { error: Error, batch: Batch },
}

impl RunError {
    pub fn kind(&self) -> Kind {
        match self {
            RunError::Fatal(error) => error.kind(),
            RunError::Batch(_) => Kind::Batch,
            RunError::Compose { error, .. } => error.kind(),
        }
    }

    /// The batch, when every item was attempted.
    pub fn batch(&self) -> Option<&Batch> {
        match self {
            RunError::Fatal(_) => None,
            RunError::Batch(error) => Some(&error.batch),
            RunError::Compose { batch, .. } => Some(batch),
        }
    }
}

impl From<Error> for RunError {
    fn from(error: Error) -> Self {
        RunError::Fatal(error)
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Fatal(error) => error.fmt(f),
            RunError::Batch(error) => error.fmt(f),
            RunError::Compose { error, .. } => error.fmt(f),
        }
    }
}

impl std::error::Error for RunError { }

/// Scans a source tree, publishes every item, then composes the site.
#[derive(Debug)]
pub struct Pipeline {
    settings: Settings,
    site: Arc<Site>,
    span: Span,
}

fn existing_dir(path: &Path, what: &'static str) -> Result<PathBuf> {
    let canonical = path.canonicalize().chain_with(|| error! {
        format!("{what} must be an existing directory"),
        what => path.display(),
    })?;

    match canonical.is_dir() {
        true => Ok(canonical),
        false => err! {
            Kind::Io; format!("{what} must be a directory"),
            what => path.display(),
        },
    }
}

impl Pipeline {
    /// Checks `settings` and prepares the output folder.
    pub fn new(mut settings: Settings) -> Result<Pipeline> {
        if settings.base().is_empty() {
            return err!("a base URI is required", "hint" => "pass it as an argument or set BASE_URI");
        }

        settings.source = existing_dir(&settings.source, "source folder")?;
        if let Some(output) = &settings.output {
            std::fs::create_dir_all(output).chain_with(|| error! {
                "failed to create output folder",
                "output folder" => output.display(),
            })?;

            settings.output = Some(existing_dir(output, "output folder")?);
        }

        if let Some(templates) = &settings.templates {
            settings.templates = Some(existing_dir(templates, "templates folder")?);
        }

        let span = tracing::info_span!("pipeline", source = %settings.source.display());
        let site = Arc::new(Site::new(&settings)?);
        Ok(Pipeline { settings, site, span })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn site(&self) -> &Arc<Site> {
        &self.site
    }

    fn scanner(&self) -> Scanner {
        let settings = &self.settings;
        let mut scanner = Scanner::new(&settings.source, settings.ignore_filter(), &self.span)
            .passthrough(settings.passthrough.iter().cloned());

        if let Some(output) = &settings.output {
            scanner = scanner.exclude(output);
        }

        if let Some(templates) = &settings.templates {
            scanner = scanner.exclude(templates);
        }

        scanner
    }

    /// Runs the pipeline: scan, publish, aggregate, compose.
    ///
    /// Every scanned item is attempted even when others fail. Failures are
    /// reported together, after the site was composed. Past the scan, every
    /// error carries the batch.
    pub fn run(&self) -> Result<Batch, RunError> {
        let _span = self.span.enter();
        let items = self.scanner().scan()?;
        info!(items = items.len(), parallel = self.settings.parallel, "publishing");

        let ontologies = OntologyPublisher::new(self.site.clone(), &self.span)
            .namespaces(scan::namespaces(&items));
        let vocabularies = VocabularyPublisher::new(self.site.clone(), &self.span);
        let aggregator = Aggregator::new();
        let dispatch = |item: &SourceItem| match item.kind {
            SourceKind::Ontology => aggregator.record(item.kind, ontologies.publish(item)),
            SourceKind::Vocabulary => aggregator.record(item.kind, vocabularies.publish(item)),
            SourceKind::Passthrough => self.copy_through(item),
        };

        match self.settings.parallel {
            true => items.par_iter().for_each(dispatch),
            false => items.iter().for_each(dispatch),
        }

        let mut batch = aggregator.finish();
        let composed = Composer::new(self.site.clone(), &self.span).compose(&mut batch);
        info!(
            ontologies = batch.ontologies.len(),
            vocabularies = batch.vocabularies.len(),
            failed = batch.failed_ontologies.len() + batch.failed_vocabularies.len(),
            "run complete"
        );

        if let Err(error) = composed {
            return Err(RunError::Compose { error, batch });
        }

        batch.into_result().map_err(RunError::Batch)
    }

    fn copy_through(&self, item: &SourceItem) {
        let target = self.site.output_dir(&item.nssub).join(&item.file_name);
        if let Err(e) = util::copy(&item.path, &target) {
            warn!(key = %item.key(), "failed to copy file: {}", e.summary());
        }
    }
}
