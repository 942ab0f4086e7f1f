//! The converters a publisher hands its rendered sources to.
//!
//! Both are traits so that a site can swap in other tools; [`OntoDoc`] and
//! [`CsvGenerator`] are the implementations the pipeline uses by default.

mod ontodoc;
mod rows;

pub use ontodoc::OntoDoc;
pub use rows::{CsvGenerator, Row, read_rows};

use std::fmt::Debug;
use std::path::Path;

use crate::error::Result;
use crate::graph::Graph;
use crate::templating::Context;

/// The result of converting one ontology document.
#[derive(Debug)]
pub struct Conversion {
    /// The HTML documentation page.
    pub html: String,
    /// The graph the page was generated from.
    pub graph: Graph,
}

pub trait OntologyConverter: Send + Sync + Debug {
    /// Converts the Turtle document at `path` to HTML. Relative IRIs in the
    /// document resolve against `base`.
    fn convert(&self, path: &Path, base: &str) -> Result<Conversion>;
}

pub trait DocumentGenerator: Send + Sync + Debug {
    /// Renders the table at `source` through `template` into `output`.
    /// `vars` is merged into the template context next to the rows.
    fn generate(&self, source: &Path, template: &str, vars: &Context, output: &Path) -> Result<()>;
}
