//! Per-item publication.
//!
//! Every accepted source file goes through one publisher and comes out as
//! exactly one [`Publication`]: a record of where its artifacts went and an
//! [`Outcome`]. A publisher never returns an error; whatever goes wrong is
//! captured in the outcome, together with the [`Stage`] it went wrong in.

mod ontology;
mod vocabulary;

pub use ontology::OntologyPublisher;
pub use vocabulary::{VocabularyPublisher, ValidatedRow, validate_csv_ids, VOCABULARY_ALIAS};
pub use vocabulary::{rewrite_html_fragments, rewrite_turtle_fragments};

use std::path::{Path, PathBuf};
use std::sync::Arc;

use derive_more::Debug;
use serde::Serialize;
use tracing::{debug, warn, Span};

use crate::config::Settings;
use crate::convert::{CsvGenerator, DocumentGenerator, OntoDoc, OntologyConverter};
use crate::error::{Error, Kind, Result};
use crate::scan::SourceItem;
use crate::templating::{self, minijinja::MiniJinjaEngine, Engine};
use crate::util::PathExt;

pub use crate::graph::Metadata;

/// Where an item is in its publication.
///
/// ```text
/// Pending -> Rendering -> Converting -> PostProcessing -> Finalizing -> Done
///                 \            \               \               \
///                  +------------+---------------+---------------+--> Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Pending,
    Rendering,
    Converting,
    PostProcessing,
    Finalizing,
    Done,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub kind: Kind,
    /// The stage that was running when the item failed.
    pub stage: Stage,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    Success(Metadata),
    Failure(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        match self {
            Outcome::Success(metadata) => Some(metadata),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            Outcome::Failure(failure) => Some(failure),
            Outcome::Success(_) => None,
        }
    }

    /// The terminal stage: `Done` or `Failed`.
    pub fn stage(&self) -> Stage {
        match self {
            Outcome::Success(_) => Stage::Done,
            Outcome::Failure(_) => Stage::Failed,
        }
    }
}

/// The record of one published source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    /// `{nssub}/{file_name}`, `nssub` being `.` at the root.
    pub key: String,
    /// Display name: the file stem, prefixed with `{nssub}/` when nested.
    pub name: String,
    /// Folder of the source relative to the scan root, `.` at the root.
    pub folder: String,
    /// The primary HTML artifact, relative to the output root.
    pub href: String,
    /// The Turtle artifact, relative to the output root.
    pub turtle: String,
    /// The folder-scoped copy of the HTML artifact, relative to the output
    /// root.
    pub alias: String,
    pub draft: bool,
    #[serde(flatten)]
    pub outcome: Outcome,
}

impl Publication {
    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// What every publisher shares: settings, engines and converters.
#[derive(Debug)]
pub struct Site {
    /// Base URI without a trailing `/`.
    pub base: String,
    pub output_root: PathBuf,
    pub camel_case: bool,
    /// Renders source files as templates; rooted at the source root.
    pub sources: Arc<dyn Engine>,
    /// Renders site templates; rooted at the templates folder, if any.
    pub templates: Arc<dyn Engine>,
    pub converter: Arc<dyn OntologyConverter>,
    pub generator: Arc<dyn DocumentGenerator>,
    #[debug(ignore)]
    pub stylesheet: Arc<str>,
}

/// Name of the stylesheet written next to every page.
pub const STYLESHEET: &str = "style.css";

impl Site {
    /// The site for `settings`, with the default converters.
    pub fn new(settings: &Settings) -> Result<Site> {
        let templates_root = settings.templates.as_deref();
        if let Some(root) = templates_root {
            if !root.is_dir() {
                return err! {
                    Kind::Io; "templates folder must be an existing directory",
                    "templates" => root.display(),
                };
            }
        }

        let templates: Arc<dyn Engine> = Arc::new(MiniJinjaEngine::new(templates_root, true));
        Ok(Site {
            base: settings.base().to_string(),
            output_root: settings.output_root().to_path_buf(),
            camel_case: settings.camel_case,
            sources: Arc::new(MiniJinjaEngine::new(Some(&settings.source), false)),
            converter: Arc::new(OntoDoc::new(templates.clone())),
            generator: Arc::new(CsvGenerator::new(templates.clone())),
            stylesheet: templating::stylesheet(templates_root)?.into(),
            templates,
        })
    }

    /// The output folder mirroring the source folder `nssub`.
    pub fn output_dir(&self, nssub: &Path) -> PathBuf {
        self.output_root.join(nssub)
    }

    /// Writes the stylesheet into `folder`.
    pub fn write_stylesheet(&self, folder: &Path) -> Result<()> {
        crate::util::write(&folder.join(STYLESHEET), self.stylesheet.as_bytes())
    }
}

/// Display name of `item`: `stem`, or `{nssub}/{stem}` when nested.
pub fn display_name(item: &SourceItem, stem: &str) -> String {
    match item.at_root() {
        true => stem.to_string(),
        false => format!("{}/{stem}", item.nssub.to_posix()),
    }
}

/// Tracks the stage of one item and turns its result into an [`Outcome`].
#[derive(Debug)]
pub(crate) struct Progress {
    stage: Stage,
    span: Span,
}

impl Progress {
    pub fn new(span: Span) -> Self {
        Progress { stage: Stage::Pending, span }
    }

    pub fn enter(&mut self, stage: Stage) {
        debug!(parent: &self.span, ?stage, "entering stage");
        self.stage = stage;
    }

    pub fn finish(self, result: Result<Metadata>) -> Outcome {
        match result {
            Ok(metadata) => {
                debug!(parent: &self.span, ?metadata, "published");
                Outcome::Success(metadata)
            }
            Err(error) => self.fail(error),
        }
    }

    fn fail(self, error: Error) -> Outcome {
        let failure = Failure {
            kind: error.kind(),
            stage: self.stage,
            message: error.summary(),
        };

        warn!(parent: &self.span, kind = ?failure.kind, stage = ?failure.stage, "{error}");
        Outcome::Failure(failure)
    }
}
