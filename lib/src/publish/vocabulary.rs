use std::path::PathBuf;
use std::sync::Arc;

use regex::Regex;
use rustc_hash::FxHashMap;
use serde_json::json;
use tracing::{debug, Span};

use crate::convert::{read_rows, Row};
use crate::error::{Kind, Result};
use crate::fragment::{self, fragment_of, FragmentMap};
use crate::graph::Metadata;
use crate::html::{describedby_link, set_describedby, Dom, HtmlTree};
use crate::publish::{display_name, Progress, Publication, Site, Stage};
use crate::scan::{strip_draft, SourceItem};
use crate::util::{self, PathExt};

/// Column holding a concept's identifier or full IRI.
pub const ID_COLUMN: &str = "ID";

/// Column holding a concept's English label, the identifier fallback.
pub const LABEL_COLUMN: &str = "PREFLABEL_EN";

/// File name of the folder-scoped copy of a vocabulary page.
pub const VOCABULARY_ALIAS: &str = "vocab.html";

/// A row that passed identifier validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRow {
    /// 1-based position of the row in the table, header excluded.
    pub row: usize,
    /// The identifier as written: the `ID` fragment or the label.
    pub label: String,
    /// The identifier as published.
    pub id: String,
}

/// Checks that every row of a vocabulary table yields a usable, unique
/// identifier.
///
/// A row's identifier is the part after the last `#` of its `ID` column, or
/// its `PREFLABEL_EN` column when `ID` is empty, normalized if `normalize` is
/// set. Rows with neither are reported, as is every identifier claimed by
/// more than one row. Both the rows that passed and the error messages are
/// returned.
pub fn validate_csv_ids(rows: &[Row], normalize: bool) -> (Vec<ValidatedRow>, Vec<String>) {
    let cell = |row: &Row, column: &str| -> Option<String> {
        row.get(column).map(|s| s.trim()).filter(|s| !s.is_empty()).map(str::to_string)
    };

    let mut valid = vec![];
    let mut errors = vec![];
    for (i, row) in rows.iter().enumerate() {
        let label = cell(row, ID_COLUMN)
            .map(|id| fragment_of(&id).to_string())
            .filter(|id| !id.is_empty())
            .or_else(|| cell(row, LABEL_COLUMN));

        match label {
            Some(label) => valid.push(ValidatedRow {
                row: i + 1,
                id: fragment::normalize(&label, normalize),
                label,
            }),
            None => errors.push(format!("Row {} has neither {ID_COLUMN} nor {LABEL_COLUMN}", i + 1)),
        }
    }

    let mut order = vec![];
    let mut claims: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    for row in &valid {
        claims.entry(row.id.as_str())
            .or_insert_with(|| {
                order.push(row.id.as_str());
                vec![]
            })
            .push(row.row);
    }

    for id in order {
        let rows = &claims[id];
        if rows.len() > 1 {
            let rows: Vec<_> = rows.iter().map(|r| r.to_string()).collect();
            errors.push(format!("Duplicate ID '{id}' in rows {}", rows.join(", ")));
        }
    }

    (valid, errors)
}

/// Renames entity identifiers in a vocabulary page.
///
/// Every element with class `entity` whose `.iri` text starts with `prefix`
/// has the rest of that IRI resolved through `map`. The element's `id`, every
/// `.toc` anchor pointing at the old id and the displayed IRI are then
/// updated together. Anchors are matched against the hrefs they were
/// rendered with, so each is renamed at most once.
pub fn rewrite_html_fragments<H: HtmlTree>(html: &str, prefix: &str, map: &mut FragmentMap) -> Result<String> {
    let dom = H::parse(html);
    let root = dom.root();

    let mut renames = vec![];
    let mut hrefs: FxHashMap<String, String> = FxHashMap::default();
    for entity in dom.find_by_class(&root, "entity") {
        let Some(iri_node) = dom.find_by_class(&entity, "iri").into_iter().next() else {
            continue;
        };

        let iri = dom.text(&iri_node).trim().to_string();
        let Some(label) = iri.strip_prefix(prefix) else {
            continue;
        };

        let new = map.resolve(label)?.to_string();
        let old_id = dom.attr(&entity, "id").unwrap_or_else(|| label.to_string());
        for stale in [old_id.as_str(), label] {
            hrefs.entry(format!("#{stale}")).or_insert_with(|| format!("#{new}"));
        }

        renames.push((entity, iri_node, new));
    }

    let anchors = dom.find_by_class(&root, "toc")
        .iter()
        .flat_map(|toc| dom.find_by_tag(toc, "a"))
        .collect::<Vec<_>>();

    for anchor in &anchors {
        if let Some(href) = dom.attr(anchor, "href").and_then(|href| hrefs.get(&href)) {
            dom.set_attr(anchor, "href", href);
        }
    }

    for (entity, iri_node, new) in renames {
        dom.set_attr(&entity, "id", &new);
        dom.set_text(&iri_node, &format!("{prefix}{new}"));
    }

    dom.serialize()
}

/// Renames every `<{prefix}{fragment}>` IRI in a Turtle document, resolving
/// each distinct fragment once through `map`.
///
/// Labels already in `map` are matched verbatim, longest first, so a label
/// may contain characters such as `#` or `>`. Any other fragment stops at
/// the first character an IRI cannot hold.
pub fn rewrite_turtle_fragments(turtle: &str, prefix: &str, map: &mut FragmentMap) -> Result<String> {
    let mut fragments: Vec<_> = map.labels().map(regex::escape).collect();
    fragments.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    fragments.push(r#"[^\s<>"{}|^`\\]*"#.to_string());

    let pattern = Regex::new(&format!("<{}({})>", regex::escape(prefix), fragments.join("|")))?;
    for captures in pattern.captures_iter(turtle) {
        map.resolve(&captures[1])?;
    }

    let renamed = pattern.replace_all(turtle, |captures: &regex::Captures<'_>| {
        let fragment = &captures[1];
        format!("<{prefix}{}>", map.get(fragment).unwrap_or(fragment))
    });

    Ok(renamed.into_owned())
}

/// `my-terms` to `My Terms`.
fn title_of(name: &str) -> String {
    name.split(['-', '_', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(head) => head.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Publishes one CSV vocabulary as an HTML page and a SKOS Turtle file
/// whose concept identifiers agree.
#[derive(Debug, Clone)]
pub struct VocabularyPublisher {
    site: Arc<Site>,
    span: Span,
}

/// Names and output locations for one vocabulary.
#[derive(Debug)]
struct Targets {
    /// Display name, without the draft suffix.
    name: String,
    /// The stem without its draft suffix.
    base_stem: String,
    html_name: String,
    turtle_name: String,
    html: PathBuf,
    turtle: PathBuf,
    alias: PathBuf,
}

impl VocabularyPublisher {
    pub fn new(site: Arc<Site>, parent: &Span) -> Self {
        VocabularyPublisher { site, span: tracing::debug_span!(parent: parent, "vocabulary") }
    }

    fn targets(&self, item: &SourceItem) -> Targets {
        let base_stem = strip_draft(item.file_stem()).to_string();
        let suffix = if item.draft { "_vocab_draft" } else { "_vocab" };
        let html_name = format!("{base_stem}{suffix}.html");
        let turtle_name = format!("{base_stem}{suffix}.ttl");

        let out = self.site.output_dir(&item.nssub);
        Targets {
            name: display_name(item, &base_stem),
            html: out.join(&html_name),
            turtle: out.join(&turtle_name),
            alias: out.join(&base_stem).join(VOCABULARY_ALIAS),
            base_stem,
            html_name,
            turtle_name,
        }
    }

    /// Publishes `item`. Failures are recorded in the returned publication.
    pub fn publish(&self, item: &SourceItem) -> Publication {
        let span = tracing::debug_span!(parent: &self.span, "publish", key = %item.key());
        let targets = self.targets(item);

        let mut progress = Progress::new(span);
        let result = self.run(item, &targets, &mut progress);
        Publication {
            key: item.key(),
            folder: item.nssub.to_posix(),
            href: item.nssub.join(&targets.html_name).to_posix(),
            turtle: item.nssub.join(&targets.turtle_name).to_posix(),
            alias: item.nssub.join(&targets.base_stem).join(VOCABULARY_ALIAS).to_posix(),
            draft: item.draft,
            outcome: progress.finish(result),
            name: targets.name,
        }
    }

    fn run(&self, item: &SourceItem, targets: &Targets, progress: &mut Progress) -> Result<Metadata> {
        progress.enter(Stage::Rendering);
        let rows = read_rows(&item.path)?;
        let (valid, errors) = validate_csv_ids(&rows, self.site.camel_case);
        if !errors.is_empty() {
            return err! {
                Kind::Validation; errors.join("; "),
                "source" => item.path.display(),
            };
        }

        debug!(rows = valid.len(), "validated identifiers");
        let iri_prefix = format!("{}/{}#", self.site.base, targets.name);
        let title = title_of(&targets.base_stem);
        let vars = |reference: &str| json!({
            "baseuri": self.site.base,
            "name": targets.name,
            "title": title,
            "iri_prefix": iri_prefix,
            "scheme": iri_prefix.trim_end_matches('#'),
            "signposting": describedby_link(&targets.turtle_name),
            "ref": reference,
            "draft": item.draft,
            "normalize": self.site.camel_case,
        });

        progress.enter(Stage::Converting);
        let generator = &self.site.generator;
        generator.generate(&item.path, "vocab.html", &vars(&targets.html_name), &targets.html)?;
        generator.generate(&item.path, "vocab.ttl", &vars(&targets.turtle_name), &targets.turtle)?;

        progress.enter(Stage::PostProcessing);
        let mut fragments = FragmentMap::new(self.site.camel_case);
        for row in &valid {
            fragments.resolve(&row.label)?;
        }

        let html = util::read(&targets.html)?;
        let html = rewrite_html_fragments::<Dom>(&html, &iri_prefix, &mut fragments)?;
        util::write(&targets.html, &html)?;

        let turtle = util::read(&targets.turtle)?;
        let turtle = rewrite_turtle_fragments(&turtle, &iri_prefix, &mut fragments)?;
        util::write(&targets.turtle, turtle)?;
        debug!(identifiers = fragments.len(), renamed = fragments.renames(), "normalized identifiers");

        progress.enter(Stage::Finalizing);
        let parent_turtle = format!("../{}", targets.turtle_name);
        let alias = set_describedby::<Dom>(&html, &parent_turtle)?;
        util::write(&targets.alias, alias.as_deref().unwrap_or(&html))?;
        for folder in [targets.html.parent(), targets.alias.parent()].into_iter().flatten() {
            self.site.write_stylesheet(folder)?;
        }

        Ok(Metadata { title: Some(title), modified: None })
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::*;
    use crate::config::Settings;
    use crate::graph::Graph;
    use crate::scan::{IgnoreFilter, Scanner};

    fn rows(table: &[(&str, &str)]) -> Vec<Row> {
        table.iter()
            .map(|(id, label)| Row::from([
                (ID_COLUMN.to_string(), id.to_string()),
                (LABEL_COLUMN.to_string(), label.to_string()),
            ]))
            .collect()
    }

    fn publish(root: &Path, camel_case: bool) -> Vec<Publication> {
        let settings = Settings {
            base_uri: "https://example.org".into(),
            source: root.into(),
            camel_case,
            ..Settings::default()
        };

        let site = Arc::new(Site::new(&settings).unwrap());
        let publisher = VocabularyPublisher::new(site, &Span::none());
        Scanner::new(root, IgnoreFilter::default(), &Span::none())
            .scan()
            .unwrap()
            .iter()
            .map(|item| publisher.publish(item))
            .collect()
    }

    #[test]
    fn duplicate_ids_are_reported() {
        let (valid, errors) = validate_csv_ids(&rows(&[("1", "One"), ("1", "Uno")]), true);
        assert_eq!(valid.len(), 2);
        assert_eq!(errors, vec!["Duplicate ID '1' in rows 1, 2"]);

        let (_, errors) = validate_csv_ids(&rows(&[("1", "One"), ("2", "Two")]), true);
        assert!(errors.is_empty());

        let table = rows(&[("b", ""), ("a", ""), ("b", ""), ("c", ""), ("a", ""), ("b", "")]);
        let (_, errors) = validate_csv_ids(&table, true);
        assert_eq!(errors, vec!["Duplicate ID 'b' in rows 1, 3, 6", "Duplicate ID 'a' in rows 2, 5"]);
    }

    #[test]
    fn ids_fall_back_to_labels() {
        let table = rows(&[("https://x.org/v#first", ""), ("", "Test One"), ("", "")]);
        let (valid, errors) = validate_csv_ids(&table, true);
        assert_eq!(valid, vec![
            ValidatedRow { row: 1, label: "first".into(), id: "first".into() },
            ValidatedRow { row: 2, label: "Test One".into(), id: "testOne".into() },
        ]);

        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Row 3"));
    }

    #[test]
    fn normalization_can_create_duplicates() {
        let table = rows(&[("", "Test One"), ("", "test one")]);
        let (_, errors) = validate_csv_ids(&table, true);
        assert_eq!(errors, vec!["Duplicate ID 'testOne' in rows 1, 2"]);

        let (_, errors) = validate_csv_ids(&table, false);
        assert!(errors.is_empty());
    }

    #[test]
    fn rewrites_turtle() {
        let turtle = "<https://x.org/v#Test One> a skos:Concept ; skos:inScheme <https://x.org/v> .\n\
                      <https://x.org/v#Other> skos:broader <https://x.org/v#Test One> .";

        let mut map = FragmentMap::new(true);
        map.resolve("Test One").unwrap();
        let out = rewrite_turtle_fragments(turtle, "https://x.org/v#", &mut map).unwrap();
        assert!(out.contains("<https://x.org/v#testOne> a"));
        assert!(out.contains("skos:broader <https://x.org/v#testOne>"));
        assert!(out.contains("<https://x.org/v#other>"));
        assert!(out.contains("<https://x.org/v>"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn rewrites_html_consistently() {
        let html = r##"<html><body>
            <nav class="toc"><a href="#Test One">Test One</a><a href="#keep">Keep</a></nav>
            <section class="entity" id="Test One"><code class="iri">https://x.org/v#Test One</code></section>
            <section class="entity" id="keep"><code class="iri">https://other.org/keep</code></section>
        </body></html>"##;

        let mut map = FragmentMap::new(true);
        let out = rewrite_html_fragments::<Dom>(html, "https://x.org/v#", &mut map).unwrap();
        assert!(out.contains(r##"<a href="#testOne">"##));
        assert!(out.contains(r#"id="testOne""#));
        assert!(out.contains(">https://x.org/v#testOne<"));
        assert!(out.contains(r##"<a href="#keep">"##));
        assert_eq!(map.get("Test One"), Some("testOne"));
    }

    #[test]
    fn anchors_are_renamed_once() {
        // "B c" becomes "bC", which is itself the label of the next concept.
        let html = r##"<html><body>
            <nav class="toc"><a href="#B c">B c</a><a href="#bC">bC</a></nav>
            <section class="entity" id="B c"><code class="iri">https://x.org/v#B c</code></section>
            <section class="entity" id="bC"><code class="iri">https://x.org/v#bC</code></section>
        </body></html>"##;

        let mut map = FragmentMap::new(true);
        let out = rewrite_html_fragments::<Dom>(html, "https://x.org/v#", &mut map).unwrap();
        let dom = Dom::parse(&out);
        let root = dom.root();
        let hrefs: Vec<_> = dom.find_by_tag(&root, "a")
            .iter()
            .filter_map(|a| dom.attr(a, "href"))
            .collect();

        let ids: Vec<_> = dom.find_by_class(&root, "entity")
            .iter()
            .filter_map(|e| dom.attr(e, "id"))
            .collect();

        assert_eq!(hrefs, ["#bC", "#bc"]);
        assert_eq!(ids, ["bC", "bc"]);
        assert!(out.contains(">https://x.org/v#bC<"));
        assert!(out.contains(">https://x.org/v#bc<"));
    }

    #[test]
    fn labels_with_iri_delimiters_agree_across_artifacts() {
        let labels = ["C# language", "Temp > 30", "Has \"quotes\" inside"];
        let mut map = FragmentMap::new(true);
        for label in labels {
            map.resolve(label).unwrap();
        }

        let turtle: String = labels.iter()
            .map(|label| format!("<https://x.org/v#{label}> a skos:Concept .\n"))
            .collect();

        let turtle = rewrite_turtle_fragments(&turtle, "https://x.org/v#", &mut map).unwrap();
        assert_eq!(turtle, "<https://x.org/v#cLanguage> a skos:Concept .\n\
                            <https://x.org/v#temp30> a skos:Concept .\n\
                            <https://x.org/v#hasQuotesInside> a skos:Concept .\n");

        let html = r##"<html><body>
            <nav class="toc"><a href="#language">C#</a><a href="#Temp &gt; 30">T</a></nav>
            <section class="entity" id="language"><code class="iri">https://x.org/v#C# language</code></section>
            <section class="entity" id="Temp &gt; 30"><code class="iri">https://x.org/v#Temp &gt; 30</code></section>
        </body></html>"##;

        let html = rewrite_html_fragments::<Dom>(html, "https://x.org/v#", &mut map).unwrap();
        assert!(html.contains(r##"href="#cLanguage""##));
        assert!(html.contains(r##"href="#temp30""##));
        assert!(html.contains(r#"id="cLanguage""#));
        assert!(html.contains(r#"id="temp30""#));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn colliding_labels_fail_the_rewrite() {
        let html = r#"<html><body>
            <section class="entity"><code class="iri">https://x.org/v#Test One</code></section>
            <section class="entity"><code class="iri">https://x.org/v#test, one</code></section>
        </body></html>"#;

        let mut map = FragmentMap::new(true);
        let error = rewrite_html_fragments::<Dom>(html, "https://x.org/v#", &mut map).unwrap_err();
        assert_eq!(error.kind(), Kind::Validation);
    }

    #[test]
    fn titles() {
        assert_eq!(title_of("my-terms"), "My Terms");
        assert_eq!(title_of("SHIP_types"), "Ship Types");
    }

    #[test]
    fn publishes_a_draft_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("terms_draft.csv"), "ID,PREFLABEL_EN\n,Test One\n,Has \"quotes\" inside\n")
            .unwrap();

        let publications = publish(&root, true);
        assert_eq!(publications.len(), 1);
        let publication = &publications[0];
        assert!(publication.is_success(), "{:?}", publication.outcome);
        assert!(publication.draft);
        assert_eq!(publication.name, "terms");
        assert_eq!(publication.href, "terms_vocab_draft.html");

        let html = fs::read_to_string(root.join("terms_vocab_draft.html")).unwrap();
        assert!(html.contains(r##"href="#testOne""##));
        assert!(html.contains(r##"href="#hasQuotesInside""##));
        assert!(html.contains(r#"id="testOne""#));
        assert!(!html.contains(r##"href="#Test One""##));
        assert!(html.contains("describedby"));

        let turtle = fs::read_to_string(root.join("terms_vocab_draft.ttl")).unwrap();
        assert!(turtle.contains("<https://example.org/terms#testOne>"));
        assert!(turtle.contains("<https://example.org/terms#hasQuotesInside>"));
        let alias = fs::read_to_string(root.join("terms/vocab.html")).unwrap();
        assert!(alias.contains(r#"href="../terms_vocab_draft.ttl""#));
        assert!(alias.contains(r#"id="testOne""#));
        assert!(root.join("terms/style.css").is_file());
    }

    #[test]
    fn keeps_labels_without_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("terms.csv"), "ID,PREFLABEL_EN\nalpha,Alpha\nbeta,Beta\n").unwrap();

        let publications = publish(&root, false);
        assert!(publications[0].is_success());
        let turtle = fs::read_to_string(root.join("terms_vocab.ttl")).unwrap();
        assert!(turtle.contains("<https://example.org/terms#alpha>"));
        assert!(turtle.contains("skos:prefLabel \"Alpha\"@en"));
    }

    #[test]
    fn publishes_labels_with_iri_delimiters() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let table = "ID,PREFLABEL_EN\n,C# language\n,Temp > 30\nx#Deep id,Deep\n";
        fs::write(root.join("terms.csv"), table).unwrap();

        let publications = publish(&root, true);
        assert!(publications[0].is_success(), "{:?}", publications[0].outcome);

        let html = fs::read_to_string(root.join("terms_vocab.html")).unwrap();
        let turtle = fs::read_to_string(root.join("terms_vocab.ttl")).unwrap();
        for id in ["cLanguage", "temp30", "deepId"] {
            assert!(html.contains(&format!(r##"href="#{id}""##)), "{id}: {html}");
            assert!(html.contains(&format!(r#"id="{id}""#)), "{id}: {html}");
            assert!(turtle.contains(&format!("<https://example.org/terms#{id}>")), "{id}: {turtle}");
        }

        assert!(!turtle.contains("#temp>"));
        assert!(Graph::parse(turtle.as_bytes(), None).is_ok(), "{turtle}");
    }

    #[test]
    fn duplicate_rows_fail_validation() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        fs::write(root.join("terms.csv"), "ID,PREFLABEL_EN\n1,One\n1,Uno\n").unwrap();

        let publications = publish(&root, true);
        let failure = publications[0].outcome.failure().unwrap();
        assert_eq!(failure.kind, Kind::Validation);
        assert_eq!(failure.stage, Stage::Rendering);
        assert!(failure.message.contains("Duplicate ID '1'"));
        assert!(!root.join("terms_vocab.html").exists());
    }
}
