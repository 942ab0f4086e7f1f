#![doc = svgbobdoc::transform!(
//! Publishes a tree of ontologies and vocabularies as a static site.
//!
//! # Overview
//!
//! The input is a folder of Turtle ontologies (`.ttl`) and CSV vocabularies
//! (`.csv`), possibly nested in namespace folders. The output is a
//! cross-linked HTML site, one page per source plus index pages, next to the
//! machine-readable Turtle each page describes.
//!
//! A run flows through the following components:
//!
//! ```svgbob
//!   +---------+     +-------------+     +------------+     +----------+
//!   | Scanner +---->| publishers  +---->| Aggregator +---->| Composer |
//!   +---------+     +------+------+     +------------+     +----------+
//!    source tree           |              keyed records      index pages,
//!                   +------+-------+                         merges, links
//!                   |              |
//!             +-----+----+   +-----+------+
//!             | ontology |   | vocabulary |
//!             +----------+   +-----+------+
//!                                  |
//!                            +-----+-------+
//!                            | FragmentMap |
//!                            +-------------+
//! ```
//!
//!   * The [`Scanner`](scan::Scanner) walks the source tree, skipping
//!     ignored folders, and classifies every file it keeps.
//!
//!   * Each ontology is rendered as a template, converted to HTML and mined
//!     for its title and modification date by the
//!     [`OntologyPublisher`](publish::OntologyPublisher).
//!
//!   * Each vocabulary is rendered twice, as HTML and as SKOS Turtle, by the
//!     [`VocabularyPublisher`](publish::VocabularyPublisher). Concept
//!     identifiers in both artifacts are then normalized through a single
//!     [`FragmentMap`](fragment::FragmentMap) so the two always agree.
//!
//!   * Every item ends up as exactly one
//!     [`Publication`](publish::Publication) in the [`Batch`](batch::Batch),
//!     whether it succeeded or not. One failing item never stops the others.
//!
//!   * The [`Composer`](compose::Composer) finally merges vocabularies into
//!     their ontologies, renders the index pages and links HTML pages to
//!     their Turtle documents.
//!
//! [`Pipeline`](pipeline::Pipeline) runs the whole sequence.
)]

#[macro_use]
pub mod error;
pub mod util;
pub mod fragment;
pub mod scan;
pub mod graph;
pub mod html;
pub mod templating;
pub mod convert;
pub mod publish;
pub mod batch;
pub mod compose;
pub mod config;
pub mod pipeline;

pub use config::Settings;
pub use pipeline::{Pipeline, RunError};
