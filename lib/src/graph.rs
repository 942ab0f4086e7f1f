//! An in-memory RDF graph, parsed from Turtle, with the handful of lookups
//! the publishers need.

use oxrdf::{Subject, Term, Triple};
use oxttl::TurtleParser;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

use crate::error::{Chainable, Kind, Result};

/// IRIs of the terms the publishers look for.
pub mod iri {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDF_PROPERTY: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#Property";
    pub const RDFS_CLASS: &str = "http://www.w3.org/2000/01/rdf-schema#Class";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
    pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
    pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
    pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
    pub const OWL_ONTOLOGY: &str = "http://www.w3.org/2002/07/owl#Ontology";
    pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
    pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
    pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
    pub const OWL_ANNOTATION_PROPERTY: &str = "http://www.w3.org/2002/07/owl#AnnotationProperty";
    pub const OWL_VERSION_INFO: &str = "http://www.w3.org/2002/07/owl#versionInfo";
    pub const PROF_PROFILE: &str = "http://www.w3.org/ns/dx/prof/Profile";
    pub const SKOS_CONCEPT_SCHEME: &str = "http://www.w3.org/2004/02/skos/core#ConceptScheme";
    pub const SKOS_CONCEPT: &str = "http://www.w3.org/2004/02/skos/core#Concept";
    pub const SKOS_PREF_LABEL: &str = "http://www.w3.org/2004/02/skos/core#prefLabel";
    pub const SKOS_DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";
    pub const SKOS_BROADER: &str = "http://www.w3.org/2004/02/skos/core#broader";
    pub const DCTERMS_TITLE: &str = "http://purl.org/dc/terms/title";
    pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";
    pub const DCTERMS_MODIFIED: &str = "http://purl.org/dc/terms/modified";
    pub const DCTERMS_CREATED: &str = "http://purl.org/dc/terms/created";
    pub const DCTERMS_CREATOR: &str = "http://purl.org/dc/terms/creator";
    pub const DCTERMS_LICENSE: &str = "http://purl.org/dc/terms/license";
    pub const DC_TITLE: &str = "http://purl.org/dc/elements/1.1/title";
}

/// Types whose subjects describe the document as a whole.
pub const DOCUMENT_TYPES: &[&str] = &[iri::OWL_ONTOLOGY, iri::PROF_PROFILE, iri::SKOS_CONCEPT_SCHEME];

/// Title predicates, most preferred first.
pub const TITLE_PREDICATES: &[&str] = &[iri::DCTERMS_TITLE, iri::DC_TITLE, iri::RDFS_LABEL];

/// Title and modification date of a published document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub modified: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct Graph {
    triples: Vec<Triple>,
    /// Subject key to the indices of its triples, in document order.
    subjects: FxHashMap<String, Vec<usize>>,
}

/// The lookup key of a subject or object node: the IRI, or `_:id`.
pub fn node_key(subject: &Subject) -> String {
    match subject {
        Subject::NamedNode(node) => node.as_str().to_string(),
        other => other.to_string(),
    }
}

/// The lexical text of a term: an IRI, a literal's value, or `_:id`.
pub fn term_text(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        other => other.to_string(),
    }
}

impl Graph {
    /// Parses a Turtle document. Relative IRIs resolve against `base`.
    pub fn parse(source: &[u8], base: Option<&str>) -> Result<Graph> {
        let mut parser = TurtleParser::new();
        if let Some(base) = base {
            parser = parser.with_base_iri(base).chain_with(|| error! {
                Kind::Conversion; "invalid base IRI",
                "base" => base,
            })?;
        }

        let mut graph = Graph::default();
        for triple in parser.for_reader(source) {
            graph.insert(triple?);
        }

        Ok(graph)
    }

    fn insert(&mut self, triple: Triple) {
        let index = self.triples.len();
        self.subjects.entry(node_key(&triple.subject)).or_default().push(index);
        self.triples.push(triple);
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Every subject with an `rdf:type` of `class`, in document order.
    pub fn subjects_typed(&self, class: &str) -> Vec<String> {
        let mut subjects: Vec<String> = vec![];
        let mut seen = FxHashSet::default();
        for triple in &self.triples {
            let typed = triple.predicate.as_str() == iri::RDF_TYPE
                && matches!(&triple.object, Term::NamedNode(n) if n.as_str() == class);

            if typed {
                let key = node_key(&triple.subject);
                if seen.insert(key.clone()) {
                    subjects.push(key);
                }
            }
        }

        subjects
    }

    /// The objects of `subject predicate ?o`, in document order.
    pub fn objects<'a>(&'a self, subject: &str, predicate: &'a str) -> impl Iterator<Item = &'a Term> + 'a {
        self.subjects.get(subject)
            .into_iter()
            .flatten()
            .map(|&i| &self.triples[i])
            .filter(move |t| t.predicate.as_str() == predicate)
            .map(|t| &t.object)
    }

    /// The text of every object of `subject predicate ?o`.
    pub fn values(&self, subject: &str, predicate: &str) -> Vec<String> {
        self.objects(subject, predicate).map(term_text).collect()
    }

    /// The last value of the first predicate in `predicates` that has one.
    pub fn last_value(&self, subject: &str, predicates: &[&str]) -> Option<String> {
        predicates.iter().find_map(|p| self.objects(subject, p).last().map(term_text))
    }

    /// Title and modification date across every document-level subject
    /// (ontologies, profiles and concept schemes). Later subjects win.
    pub fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::default();
        for class in DOCUMENT_TYPES {
            for subject in self.subjects_typed(class) {
                if let Some(title) = self.last_value(&subject, TITLE_PREDICATES) {
                    metadata.title = Some(title);
                }

                if let Some(modified) = self.last_value(&subject, &[iri::DCTERMS_MODIFIED]) {
                    metadata.modified = Some(modified);
                }
            }
        }

        metadata
    }
}
