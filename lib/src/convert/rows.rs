use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use crate::error::{Chainable, Kind, Result};
use crate::templating::{Context, Engine};
use crate::convert::DocumentGenerator;

/// One CSV record: column header to cell, cells trimmed.
pub type Row = BTreeMap<String, String>;

/// Reads every record of the CSV file at `path`. The first line holds the
/// column headers; records may be shorter or longer than the header.
pub fn read_rows(path: &Path) -> Result<Vec<Row>> {
    let read = || -> Result<Vec<Row>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let headers = reader.headers()?.clone();
        let mut rows = vec![];
        for record in reader.records() {
            let record = record?;
            let row = headers.iter()
                .zip(record.iter())
                .map(|(header, cell)| (header.to_string(), cell.to_string()))
                .collect();

            rows.push(row);
        }

        Ok(rows)
    };

    read().chain_with(|| error! {
        "failed to read vocabulary table",
        "path" => path.display(),
    })
}

/// Renders CSV rows through a named template.
///
/// The template sees `rows`, a list of maps keyed by column header, plus every
/// key of the variables passed to [`DocumentGenerator::generate()`].
#[derive(Debug, Clone)]
pub struct CsvGenerator {
    engine: Arc<dyn Engine>,
}

impl CsvGenerator {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        CsvGenerator { engine }
    }
}

impl DocumentGenerator for CsvGenerator {
    fn generate(&self, source: &Path, template: &str, vars: &Context, output: &Path) -> Result<()> {
        let rows = read_rows(source)?;
        let mut context = match vars {
            Context::Object(map) => map.clone(),
            Context::Null => Default::default(),
            other => return err! {
                Kind::Render; "template variables must be a map",
                "variables" => other,
            },
        };

        context.insert("rows".into(), json!(rows));
        let html = self.engine.render(template, &Context::Object(context))?;
        crate::util::write(output, html)
    }
}
