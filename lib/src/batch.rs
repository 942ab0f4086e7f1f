use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use parking_lot::Mutex;
use serde::Serialize;

use crate::error::{ErrorDetail, Kind};
use crate::publish::Publication;
use crate::scan::SourceKind;

/// Every publication of a run, keyed by `{nssub}/{file_name}`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Batch {
    pub ontologies: BTreeMap<String, Publication>,
    pub vocabularies: BTreeMap<String, Publication>,
    pub failed_ontologies: BTreeSet<String>,
    pub failed_vocabularies: BTreeSet<String>,
}

/// Collects publications as items finish, from any number of threads.
#[derive(Debug, Default)]
pub struct Aggregator {
    batch: Mutex<Batch>,
}

impl Aggregator {
    pub fn new() -> Self {
        Aggregator::default()
    }

    /// Records `publication` under its key. Passthrough files are not
    /// published, so there is nothing to record for them.
    pub fn record(&self, kind: SourceKind, publication: Publication) {
        let mut guard = self.batch.lock();
        let batch = &mut *guard;
        let (records, failures) = match kind {
            SourceKind::Ontology => (&mut batch.ontologies, &mut batch.failed_ontologies),
            SourceKind::Vocabulary => (&mut batch.vocabularies, &mut batch.failed_vocabularies),
            SourceKind::Passthrough => return,
        };

        if !publication.is_success() {
            failures.insert(publication.key.clone());
        }

        records.insert(publication.key.clone(), publication);
    }

    pub fn len(&self) -> usize {
        let batch = self.batch.lock();
        batch.ontologies.len() + batch.vocabularies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The finished batch. No more publications can be recorded.
    pub fn finish(self) -> Batch {
        self.batch.into_inner()
    }
}

impl Batch {
    pub fn is_success(&self) -> bool {
        self.failed_ontologies.is_empty() && self.failed_vocabularies.is_empty()
    }

    /// Every failed publication, ontologies first, in key order.
    pub fn failures(&self) -> impl Iterator<Item = &Publication> {
        let ontologies = self.failed_ontologies.iter().filter_map(|k| self.ontologies.get(k));
        let vocabularies = self.failed_vocabularies.iter().filter_map(|k| self.vocabularies.get(k));
        ontologies.chain(vocabularies)
    }

    pub fn len(&self) -> usize {
        self.ontologies.len() + self.vocabularies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `{"ontologies": [keys], "vocabularies": [keys]}`.
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "ontologies": self.ontologies.keys().collect::<Vec<_>>(),
            "vocabularies": self.vocabularies.keys().collect::<Vec<_>>(),
        })
    }

    /// `Err` when any publication failed. The error still carries the batch.
    pub fn into_result(self) -> Result<Batch, BatchError> {
        match self.is_success() {
            true => Ok(self),
            false => Err(BatchError { batch: self }),
        }
    }
}

/// One or more items of a run failed. Every item was still attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchError {
    pub batch: Batch,
}

impl BatchError {
    pub fn failed_keys(&self) -> impl Iterator<Item = &str> {
        self.batch.failures().map(|p| p.key.as_str())
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let failed = self.batch.failed_ontologies.len() + self.batch.failed_vocabularies.len();
        write!(f, "{failed} of {} publications failed", self.batch.len())
    }
}

impl std::error::Error for BatchError { }

impl ErrorDetail for BatchError {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.batch.failures()
            .map(|p| {
                let message = p.outcome.failure().map_or("", |f| f.message.as_str());
                (Some(p.key.clone()), message.to_string())
            })
            .collect()
    }

    fn kind(&self) -> Kind {
        Kind::Batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Metadata;
    use crate::publish::{Failure, Outcome, Stage};

    fn publication(key: &str, ok: bool) -> Publication {
        Publication {
            key: key.into(),
            name: key.into(),
            folder: ".".into(),
            href: format!("{key}.html"),
            turtle: key.into(),
            alias: format!("{key}/index.html"),
            draft: false,
            outcome: match ok {
                true => Outcome::Success(Metadata::default()),
                false => Outcome::Failure(Failure {
                    kind: Kind::Conversion,
                    stage: Stage::Converting,
                    message: "broken".into(),
                }),
            },
        }
    }

    static_assertions::assert_impl_all!(Aggregator: Send, Sync);
    static_assertions::assert_impl_all!(BatchError: Send, Sync, std::error::Error);

    #[test]
    fn collects_and_fails_once() {
        let aggregator = Aggregator::new();
        aggregator.record(SourceKind::Ontology, publication("./a.ttl", true));
        aggregator.record(SourceKind::Ontology, publication("./b.ttl", false));
        aggregator.record(SourceKind::Vocabulary, publication("sub/c.csv", true));
        aggregator.record(SourceKind::Passthrough, publication("./CNAME", true));
        assert_eq!(aggregator.len(), 3);

        let batch = aggregator.finish();
        assert_eq!(batch.summary(), serde_json::json!({
            "ontologies": ["./a.ttl", "./b.ttl"],
            "vocabularies": ["sub/c.csv"],
        }));

        let error = batch.into_result().unwrap_err();
        assert_eq!(error.failed_keys().collect::<Vec<_>>(), vec!["./b.ttl"]);
        assert_eq!(error.to_string(), "1 of 3 publications failed");
        assert_eq!(error.batch.len(), 3);

        let error = crate::error::Error::from(error);
        assert_eq!(error.kind(), Kind::Batch);
        assert!(error.to_string().contains("./b.ttl: broken"));
    }

    #[test]
    fn records_from_many_threads() {
        let aggregator = Aggregator::new();
        std::thread::scope(|scope| {
            for i in 0..8 {
                let aggregator = &aggregator;
                scope.spawn(move || {
                    aggregator.record(SourceKind::Vocabulary, publication(&format!("./{i}.csv"), i % 2 == 0));
                });
            }
        });

        let batch = aggregator.finish();
        assert_eq!(batch.vocabularies.len(), 8);
        assert_eq!(batch.failed_vocabularies.len(), 4);
        assert!(batch.into_result().is_err());
    }
}
