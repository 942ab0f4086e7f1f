use std::path::{Path, PathBuf};

use minijinja::{Environment, path_loader};
use minijinja::value::Value;

use crate::error::{Chainable, ErrorDetail, Kind, Result};
use crate::templating::{Context, Engine};

#[derive(Debug)]
pub struct MiniJinjaEngine {
    env: Environment<'static>,
    root: Option<PathBuf>,
}

impl MiniJinjaEngine {
    /// An engine loading templates from `root`. With `builtins`, names not
    /// found under `root` fall back to the templates shipped with the crate.
    pub fn new(root: Option<&Path>, builtins: bool) -> Self {
        let mut env = Environment::new();
        let files = root.map(|root| path_loader(root));
        env.set_loader(move |name| {
            if let Some(files) = &files {
                if let Some(source) = files(name)? {
                    return Ok(Some(source));
                }
            }

            Ok(builtins.then(|| super::builtin(name)).flatten().map(str::to_string))
        });

        env.add_function("now", ext::now);
        env.add_filter("deslug", ext::deslug);
        env.add_filter("date", ext::date);
        env.add_filter("split", ext::split);
        env.add_filter("fragment", ext::fragment);
        env.add_filter("local", ext::local);
        env.add_filter("turtle", ext::turtle);
        env.add_filter("markdown", ext::markdown);
        MiniJinjaEngine { env, root: root.map(Path::to_path_buf) }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }
}

impl Engine for MiniJinjaEngine {
    fn render(&self, name: &str, context: &Context) -> Result<String> {
        let render = || -> Result<String> {
            let template = self.env.get_template(name)?;
            Ok(template.render(Value::from_serializable(context))?)
        };

        render().chain_with(|| error! {
            Kind::Render; "failed to render template",
            "template" => name,
            "template root" => self.root.as_ref().map_or("<builtin>".into(), |r| r.display().to_string()),
        })
    }

    fn render_str(
        &self,
        name: Option<&str>,
        template_str: &str,
        context: &Context,
    ) -> Result<String> {
        let context = Value::from_serializable(context);
        let string = match name {
            Some(name) => self.env.render_named_str(name, template_str, context)?,
            None => self.env.render_str(template_str, context)?,
        };

        Ok(string)
    }
}

mod ext {
    use chrono::{NaiveDate, NaiveDateTime, DateTime, Utc};
    use minijinja::{value::{intern, Value}, Error, ErrorKind};

    pub fn deslug(value: &str) -> String {
        value.replace(['-', '_'], " ")
    }

    pub fn date(value: Value, fmt: &str) -> Result<Value, Error> {
        if let Ok(ts) = i64::try_from(value.clone()) {
            let datetime = DateTime::from_timestamp(ts, 0)
                .ok_or_else(|| Error::new(
                    ErrorKind::InvalidOperation,
                    "invalid timestamp provided to `date`"
                ))?;

            return Ok(datetime.format(fmt).to_string().into());
        }

        let kind = value.kind();
        let string = value.as_str()
            .ok_or_else(|| Error::new(
                ErrorKind::InvalidOperation,
                format!("`date` must be applied to a string or integer, found {kind}")
            ))?;

        let datetime = string.parse::<DateTime<Utc>>().map(|dt| dt.format(fmt))
            .or_else(|_| string.parse::<NaiveDateTime>().map(|dt| dt.format(fmt)))
            .or_else(|_| string.parse::<NaiveDate>().map(|d| d.format(fmt)))
            .map_err(|e| Error::new(
                ErrorKind::InvalidOperation,
                format!("failed to parse {string}: {e}")
            ))?;

        Ok(datetime.to_string().into())
    }

    pub fn split(value: &str, pat: &str, n: Option<usize>) -> Result<Value, Error> {
        match n {
            Some(n) => Ok(value.split(pat).nth(n).map(Value::from).unwrap_or(Value::UNDEFINED)),
            None => Ok(value.split(pat).map(intern).collect()),
        }
    }

    /// `{{ label | fragment }}`, or `{{ label | fragment(false) }}`.
    pub fn fragment(value: &str, enabled: Option<bool>) -> String {
        crate::fragment::normalize(value, enabled.unwrap_or(true))
    }

    /// The local name of an IRI: after the last `#`, else after the last `/`.
    pub fn local(iri: &str) -> String {
        let iri = iri.trim_end_matches(['#', '/']);
        iri.rsplit(['#', '/']).next().unwrap_or(iri).to_string()
    }

    /// Escapes a string for use inside a double-quoted Turtle literal.
    pub fn turtle(value: &str) -> String {
        let mut output = String::with_capacity(value.len());
        for c in value.chars() {
            match c {
                '\\' => output.push_str("\\\\"),
                '"' => output.push_str("\\\""),
                '\n' => output.push_str("\\n"),
                '\r' => output.push_str("\\r"),
                '\t' => output.push_str("\\t"),
                c => output.push(c),
            }
        }

        output
    }

    pub fn markdown(value: &str) -> Value {
        use pulldown_cmark::{html, Options, Parser};

        let mut output = String::with_capacity(value.len() * 3 / 2);
        html::push_html(&mut output, Parser::new_ext(value, Options::empty()));
        Value::from_safe_string(output)
    }

    pub fn now() -> String {
        DateTime::<Utc>::from(std::time::SystemTime::now()).format("%Y-%m-%d").to_string()
    }
}

impl ErrorDetail for minijinja::Error {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut context = vec![];
        if let Some(name) = self.name() {
            context.push((Some("template".into()), name.to_string()));
        }

        if let Some(line) = self.line() {
            context.push((Some("line".into()), line.to_string()));
        }

        context
    }

    fn kind(&self) -> Kind {
        Kind::Render
    }
}
