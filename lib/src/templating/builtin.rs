use std::path::Path;

use crate::error::Result;

/// The templates shipped with the crate, by name.
pub fn builtin(name: &str) -> Option<&'static str> {
    let source = match name {
        "ontology.html" => include_str!("../../templates/ontology.html"),
        "vocab.html" => include_str!("../../templates/vocab.html"),
        "vocab.ttl" => include_str!("../../templates/vocab.ttl"),
        "index.html" => include_str!("../../templates/index.html"),
        "namespace.html" => include_str!("../../templates/namespace.html"),
        "style.css" => include_str!("../../templates/style.css"),
        _ => return None,
    };

    Some(source)
}

/// The site stylesheet: `style.css` from `root`, else `style.scss` from
/// `root` compiled to CSS, else the built-in one.
pub fn stylesheet(root: Option<&Path>) -> Result<String> {
    if let Some(root) = root {
        let css = root.join("style.css");
        if css.is_file() {
            return crate::util::read(&css);
        }

        #[cfg(feature = "sass")]
        {
            let scss = root.join("style.scss");
            if scss.is_file() {
                return compile_scss(&scss);
            }
        }
    }

    Ok(builtin("style.css").unwrap_or_default().to_string())
}

#[cfg(feature = "sass")]
fn compile_scss(path: &Path) -> Result<String> {
    let options = grass::Options::default().style(grass::OutputStyle::Compressed);
    match grass::from_path(path, &options) {
        Ok(css) => Ok(css),
        Err(e) => err! {
            crate::error::Kind::Render; "failed to compile stylesheet",
            "path" => path.display(),
            "error" => e.to_string(),
        },
    }
}
