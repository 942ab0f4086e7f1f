pub mod minijinja;
mod builtin;

pub use builtin::*;

use std::fmt::Debug;

use crate::error::Result;

/// Template context: a JSON object, usually built with [`serde_json::json!`].
pub type Context = serde_json::Value;

pub trait Engine: Send + Sync + Debug {
    /// Renders the template `name`, resolved against the engine's root folder.
    fn render(&self, name: &str, context: &Context) -> Result<String>;

    /// Renders `template_str` directly. `name` only shows up in errors.
    fn render_str(
        &self,
        name: Option<&str>,
        template_str: &str,
        context: &Context,
    ) -> Result<String>;
}
