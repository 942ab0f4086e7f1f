use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use serde_json::json;

use crate::convert::{Conversion, OntologyConverter};
use crate::error::{Chainable, Kind, Result};
use crate::graph::{iri, Graph, DOCUMENT_TYPES};
use crate::templating::Engine;

/// Documents an ontology as a single HTML page, rendered through the
/// `ontology.html` template.
///
/// The page has a header describing the ontology itself, followed by one
/// section per kind of term: classes, properties, concepts.
#[derive(Debug, Clone)]
pub struct OntoDoc {
    engine: Arc<dyn Engine>,
    template: String,
}

/// Section id, heading, and the types whose subjects it lists.
const SECTIONS: &[(&str, &str, &[&str])] = &[
    ("classes", "Classes", &[iri::OWL_CLASS, iri::RDFS_CLASS]),
    ("object-properties", "Object properties", &[iri::OWL_OBJECT_PROPERTY]),
    ("datatype-properties", "Datatype properties", &[iri::OWL_DATATYPE_PROPERTY]),
    ("annotation-properties", "Annotation properties", &[iri::OWL_ANNOTATION_PROPERTY]),
    ("properties", "Other properties", &[iri::RDF_PROPERTY]),
    ("concepts", "Concepts", &[iri::SKOS_CONCEPT]),
];

/// Predicates listed under an entity, with their display label.
const LINKS: &[(&str, &str)] = &[
    (iri::RDFS_SUBCLASS_OF, "Subclass of"),
    (iri::RDFS_DOMAIN, "Domain"),
    (iri::RDFS_RANGE, "Range"),
    (iri::SKOS_BROADER, "Broader"),
];

const LABELS: &[&str] = &[iri::SKOS_PREF_LABEL, iri::RDFS_LABEL, iri::DCTERMS_TITLE];
const DESCRIPTIONS: &[&str] = &[iri::SKOS_DEFINITION, iri::RDFS_COMMENT, iri::DCTERMS_DESCRIPTION];

#[derive(Debug, Default, Serialize)]
struct Header {
    iri: Option<String>,
    title: Option<String>,
    description: Option<String>,
    version: Option<String>,
    created: Option<String>,
    modified: Option<String>,
    license: Option<String>,
    creators: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Section {
    id: &'static str,
    title: &'static str,
    entities: Vec<Entity>,
}

#[derive(Debug, Serialize)]
struct Entity {
    iri: String,
    id: String,
    label: String,
    description: Option<String>,
    links: Vec<Link>,
}

#[derive(Debug, Serialize)]
struct Link {
    label: &'static str,
    values: Vec<LinkValue>,
}

#[derive(Debug, Serialize)]
struct LinkValue {
    href: Option<String>,
    text: String,
}

/// The local name of `iri`: after the last `#`, else after the last `/`.
fn local_name(iri: &str) -> &str {
    let trimmed = iri.trim_end_matches(['#', '/']);
    trimmed.rsplit(['#', '/']).next().filter(|s| !s.is_empty()).unwrap_or(iri)
}

impl OntoDoc {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        OntoDoc { engine, template: "ontology.html".into() }
    }

    /// Renders through `template` instead of `ontology.html`.
    pub fn with_template<S: Into<String>>(mut self, template: S) -> Self {
        self.template = template.into();
        self
    }

    fn header(graph: &Graph) -> Header {
        let subject = DOCUMENT_TYPES.iter()
            .flat_map(|class| graph.subjects_typed(class))
            .next();

        let Some(subject) = subject else {
            return Header::default();
        };

        let metadata = graph.metadata();
        Header {
            title: metadata.title,
            modified: metadata.modified,
            description: graph.last_value(&subject, DESCRIPTIONS),
            version: graph.last_value(&subject, &[iri::OWL_VERSION_INFO]),
            created: graph.last_value(&subject, &[iri::DCTERMS_CREATED]),
            license: graph.last_value(&subject, &[iri::DCTERMS_LICENSE]),
            creators: graph.values(&subject, iri::DCTERMS_CREATOR),
            iri: Some(subject),
        }
    }

    fn entity(graph: &Graph, subject: String) -> Entity {
        let label = graph.last_value(&subject, LABELS)
            .unwrap_or_else(|| local_name(&subject).to_string());

        let links = LINKS.iter()
            .filter_map(|&(predicate, label)| {
                let values: Vec<_> = graph.values(&subject, predicate)
                    .into_iter()
                    .filter(|value| !value.starts_with("_:"))
                    .map(|value| {
                        let known = !graph.values(&value, iri::RDF_TYPE).is_empty();
                        LinkValue {
                            href: Some(match known {
                                true => format!("#{}", local_name(&value)),
                                false => value.clone(),
                            }),
                            text: graph.last_value(&value, LABELS)
                                .unwrap_or_else(|| local_name(&value).to_string()),
                        }
                    })
                    .collect();

                (!values.is_empty()).then_some(Link { label, values })
            })
            .collect();

        Entity {
            id: local_name(&subject).to_string(),
            description: graph.last_value(&subject, DESCRIPTIONS),
            label,
            links,
            iri: subject,
        }
    }

    fn sections(graph: &Graph) -> Vec<Section> {
        let mut seen = rustc_hash::FxHashSet::default();
        SECTIONS.iter()
            .filter_map(|&(id, title, classes)| {
                let mut entities: Vec<_> = classes.iter()
                    .flat_map(|class| graph.subjects_typed(class))
                    .filter(|subject| !subject.starts_with("_:"))
                    .filter(|subject| seen.insert(subject.clone()))
                    .map(|subject| Self::entity(graph, subject))
                    .collect();

                entities.sort_by(|a, b| a.label.to_lowercase().cmp(&b.label.to_lowercase()));
                (!entities.is_empty()).then_some(Section { id, title, entities })
            })
            .collect()
    }
}

impl OntologyConverter for OntoDoc {
    fn convert(&self, path: &Path, base: &str) -> Result<Conversion> {
        let source = std::fs::read(path).chain_with(|| error! {
            "failed to read ontology",
            "path" => path.display(),
        })?;

        let graph = Graph::parse(&source, Some(base)).chain_with(|| error! {
            Kind::Conversion; "ontology is not valid Turtle",
            "path" => path.display(),
        })?;

        let name = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let context = json!({
            "name": name,
            "baseuri": base,
            "ontology": Self::header(&graph),
            "sections": Self::sections(&graph),
        });

        let html = self.engine.render(&self.template, &context)?;
        Ok(Conversion { html, graph })
    }
}
