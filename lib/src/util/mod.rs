mod path_ext;

pub use path_ext::*;

use std::fs;
use std::path::{Path, PathBuf, Component};

use crate::error::{Chainable, Result};

/// A helper function to determine the relative path to `path` from `base`.
///
/// Returns `None` if there is no relative path from `base` to `path`, that is,
/// `base` and `path` do not share a common ancestor. `path` and `base` must be
/// either both absolute or both relative; returns `None` if one is relative and
/// the other absolute.
///
/// ```
/// use ontopages::util::diff_paths;
///
/// assert_eq!(diff_paths("/a/b/c", "b/c"), None);
/// assert_eq!(diff_paths("/a/b/c", "/b/c"), Some("../../a/b/c".into()));
/// assert_eq!(diff_paths("/foo/bar/quux", "/foo/bar/baz"), Some("../quux".into()));
/// assert_eq!(diff_paths("/foo/bar/baz", "/foo/bar"), Some("baz".into()));
/// ```
// Copyright 2021 Sergio Benitez
// Copyright 2012-2015 The Rust Project Developers.
// Copyright 2017 The Rust Project Developers.
// Adapted from `figment`, which adapted from `pathdiff`, which itself adapted
// from rustc's path_relative_from.
pub fn diff_paths<P, B>(path: P, base: B) -> Option<PathBuf>
     where P: AsRef<Path>, B: AsRef<Path>
{
    let (path, base) = (path.as_ref(), base.as_ref());
    if path.has_root() != base.has_root() {
        return None;
    }

    let mut ita = path.components();
    let mut itb = base.components();
    let mut comps: Vec<Component> = vec![];
    loop {
        match (ita.next(), itb.next()) {
            (None, None) => break,
            (Some(a), None) => {
                comps.push(a);
                comps.extend(ita.by_ref());
                break;
            }
            (None, _) => comps.push(Component::ParentDir),
            (Some(a), Some(b)) if comps.is_empty() && a == b => (),
            (Some(a), Some(b)) if b == Component::CurDir => comps.push(a),
            (Some(_), Some(b)) if b == Component::ParentDir => return None,
            (Some(a), Some(_)) => {
                comps.push(Component::ParentDir);
                for _ in itb {
                    comps.push(Component::ParentDir);
                }
                comps.push(a);
                comps.extend(ita.by_ref());
                break;
            }
        }
    }

    Some(comps.iter().map(|c| c.as_os_str()).collect())
}

/// Creates the parent folder of `path`, if it has one.
pub fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).chain_with(|| error! {
            "failed to create output folder",
            "folder" => parent.display(),
        })?;
    }

    Ok(())
}

/// Writes `contents` to `path`, creating missing folders.
pub fn write(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, contents).chain_with(|| error! {
        "failed to write file",
        "path" => path.display(),
    })
}

/// Copies `from` to `to`, creating missing folders. Copying a file onto
/// itself is a no-op.
pub fn copy(from: &Path, to: &Path) -> Result<()> {
    if from == to {
        return Ok(());
    }

    ensure_parent(to)?;
    fs::copy(from, to).chain_with(|| error! {
        "failed to copy file",
        "source path" => from.display(),
        "destination path" => to.display(),
    })?;

    Ok(())
}

/// Reads `path` as UTF-8.
pub fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).chain_with(|| error! {
        "failed to read file",
        "path" => path.display(),
    })
}
