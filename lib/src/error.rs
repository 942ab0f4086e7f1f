use std::{fmt, io};
use std::panic::Location;
use std::convert::Infallible;
use std::error::Error as StdError;

use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What went wrong, independent of the message.
///
/// Every [`Error`] carries a kind. Errors built from a known source (an I/O
/// error, a template error, a Turtle syntax error, ...) pick up the kind of
/// that source; errors built with [`error!`] are [`Kind::Other`] unless a kind
/// is given explicitly. An `Other` error that wraps a more specific cause
/// reports the cause's kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    /// A template failed to load or render.
    Render,
    /// An external converter rejected its input.
    Conversion,
    /// Duplicate or malformed identifiers.
    Validation,
    /// File system access failed.
    Io,
    /// One or more items of a batch failed.
    Batch,
    Other,
}

#[derive(Debug)]
pub struct Error {
    kind: Kind,
    detail: Vec<Box<dyn ErrorDetail>>,
    prev: Option<Box<Error>>,
    location: &'static Location<'static>,
}

pub trait ErrorDetail: fmt::Display + fmt::Debug + Send + Sync {
    fn context(&self) -> Vec<(Option<String>, String)> { vec![] }

    fn kind(&self) -> Kind { Kind::Other }
}

impl Error {
    #[track_caller]
    pub fn from_std<E>(error: E) -> Self
        where E: StdError + Send + Sync + 'static
    {
        Error::from(Box::new(error) as Box<dyn StdError + Send + Sync>)
    }

    /// Sets the kind of the outermost error.
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// The most specific kind in the chain, starting from the outermost error.
    pub fn kind(&self) -> Kind {
        match (self.kind, &self.prev) {
            (Kind::Other, Some(prev)) => prev.kind(),
            (kind, _) => kind,
        }
    }

    /// Places `self` behind `other`: `other` becomes the outermost error.
    pub fn chain(self, mut other: Error) -> Self {
        fn _chain(error: Error, behind: &mut Error) {
            match behind.prev.as_mut() {
                Some(prev) => _chain(error, prev),
                None => behind.prev = Some(Box::new(error)),
            }
        }

        _chain(self, &mut other);
        other
    }

    /// A single line: each message in the chain, outermost first, separated by
    /// `: `. Context parameters are omitted.
    pub fn summary(&self) -> String {
        let mut parts = vec![];
        let mut error = Some(self);
        while let Some(e) = error {
            parts.extend(e.detail.iter().map(|d| d.to_string()));
            error = e.prev.as_deref();
        }

        parts.join(": ")
    }
}

impl ErrorDetail for &(dyn StdError + Send + Sync) {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let mut ctxt = vec![];
        let mut error = self.source();
        while let Some(e) = error {
            ctxt.push((None, e.to_string()));
            error = e.source();
        }

        ctxt
    }
}

impl ErrorDetail for Box<dyn StdError + Send + Sync> {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = &**self;
        error.context()
    }
}

macro_rules! impl_error_detail_with_std_error {
    ($T:ty => $kind:expr) => {
        impl $crate::error::ErrorDetail for $T {
            fn context(&self) -> Vec<(Option<String>, String)> {
                let error: &(dyn std::error::Error + Send + Sync) = self;
                error.context()
            }

            fn kind(&self) -> $crate::error::Kind {
                $kind
            }
        }
    }
}

impl_error_detail_with_std_error!(io::Error => Kind::Io);
impl_error_detail_with_std_error!(toml::de::Error => Kind::Other);
impl_error_detail_with_std_error!(serde_json::Error => Kind::Other);
impl_error_detail_with_std_error!(regex::Error => Kind::Other);
impl_error_detail_with_std_error!(oxttl::TurtleParseError => Kind::Conversion);
impl_error_detail_with_std_error!(oxrdf::IriParseError => Kind::Conversion);

impl ErrorDetail for csv::Error {
    fn context(&self) -> Vec<(Option<String>, String)> {
        let error: &(dyn StdError + Send + Sync) = self;
        error.context()
    }

    fn kind(&self) -> Kind {
        match csv::Error::kind(self) {
            csv::ErrorKind::Io(_) => Kind::Io,
            _ => Kind::Validation,
        }
    }
}

impl ErrorDetail for String { }
impl ErrorDetail for &str { }

impl<T: ErrorDetail + 'static> From<T> for Error {
    #[track_caller]
    fn from(detail: T) -> Self {
        Error {
            kind: detail.kind(),
            prev: None,
            detail: vec![Box::new(detail)],
            location: Location::caller(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn nested(f: &mut fmt::Formatter<'_>, depth: usize, e: &Error) -> fmt::Result {
            let indent = " ".repeat(depth * 4);
            let newline = format!("\n{indent}");
            for detail in &e.detail {
                writeln!(f, "{indent}{}", detail.to_string().replace('\n', &newline))?;
                for (key, value) in detail.context() {
                    let value = value.replace('\n', &newline);
                    match key {
                        Some(key) => writeln!(f, "{indent}{key}: {value}")?,
                        None => writeln!(f, "{indent}{value}")?,
                    }
                }

                if std::env::var_os("RUST_BACKTRACE").is_some() {
                    writeln!(f, "{indent}[{}]", e.location)?;
                }
            }

            match &e.prev {
                Some(prev) => nested(f, depth + 1, prev),
                None => Ok(()),
            }
        }

        nested(f, 0, self)
    }
}

/// An error built from a message, `key => value` context and a kind.
#[derive(Debug)]
pub struct Message {
    pub text: String,
    pub kind: Kind,
    pub parameters: Vec<(Option<String>, String)>,
}

#[doc(hidden)]
#[macro_export]
macro_rules! err {
    ($($token:tt)*) => (Err($crate::error!($($token)*)));
}

/// Builds an [`Error`](crate::error::Error).
///
/// ```rust,ignore
/// error!("failed to copy", "from" => a.display(), "to" => b.display());
/// error!(Kind::Validation; "duplicate identifier", "id" => id);
/// ```
#[doc(hidden)]
#[macro_export]
macro_rules! error {
    ($kind:expr; $msg:expr $(, $($rest:tt)*)?) => (
        $crate::error::Error::from($crate::error::Message {
            text: $msg.to_string(),
            kind: $kind,
            parameters: {
                #[allow(unused_mut)]
                let mut v: Vec<(Option<String>, String)> = Vec::new();
                $($crate::error!(@param v $($rest)*);)?
                v
            },
        })
    );

    (@param $v:ident $key:expr => $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $key => $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $key:expr => $value:expr) => {
        $v.push((Some($key.to_string()), $value.to_string()));
    };

    (@param $v:ident $value:expr, $($rest:tt)*) => {
        $crate::error!(@param $v $value);
        $crate::error!(@param $v $($rest)*);
    };

    (@param $v:ident $value:expr) => {
        $v.push((None, $value.to_string()));
    };

    (@param $v:ident $(,)?) => { };

    ($msg:expr $(, $($rest:tt)*)?) => (
        $crate::error!($crate::error::Kind::Other; $msg $(, $($rest)*)?)
    );
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.text.fmt(f)
    }
}

impl ErrorDetail for Message {
    fn context(&self) -> Vec<(Option<String>, String)> {
        self.parameters.clone()
    }

    fn kind(&self) -> Kind {
        self.kind
    }
}

pub trait Chainable<T> {
    fn chain(self, other: impl Into<Error>) -> Result<T>;

    fn chain_with<F, E>(self, f: F) -> Result<T>
        where F: FnOnce() -> E, E: Into<Error>;

    /// Converts the error, if any, and tags it with `kind`.
    fn tag(self, kind: Kind) -> Result<T>;
}

impl<T, E: Into<Error>> Chainable<T> for Result<T, E> {
    #[track_caller]
    fn chain(self, other: impl Into<Error>) -> Result<T> {
        self.map_err(|e| e.into().chain(other.into()))
    }

    #[track_caller]
    fn chain_with<F, Err>(self, f: F) -> Result<T>
        where F: FnOnce() -> Err, Err: Into<Error>,
    {
        self.map_err(|e| e.into().chain(f().into()))
    }

    #[track_caller]
    fn tag(self, kind: Kind) -> Result<T> {
        self.map_err(|e| e.into().with_kind(kind))
    }
}

impl ErrorDetail for Infallible { }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_comes_from_the_most_specific_cause() {
        let io = io::Error::new(io::ErrorKind::NotFound, "gone");
        let error = Err::<(), _>(io)
            .chain(error!("failed to copy stylesheet", "path" => "style.css"))
            .unwrap_err();

        assert_eq!(error.kind(), Kind::Io);
        assert_eq!(error.summary(), "failed to copy stylesheet: gone");

        let tagged = error.with_kind(Kind::Conversion);
        assert_eq!(tagged.kind(), Kind::Conversion);
    }

    #[test]
    fn explicit_kind_in_macro() {
        let error = error!(Kind::Validation; "duplicate identifier", "id" => "testOne");
        assert_eq!(error.kind(), Kind::Validation);

        let rendered = error.to_string();
        assert!(rendered.contains("duplicate identifier"));
        assert!(rendered.contains("id: testOne"));
    }
}
