use std::path::{Path, Component};

pub trait PathExt: AsRef<Path> {
    /// The path with `/` separators and no `.` components; `.` if empty.
    fn to_posix(&self) -> String;

    /// `self` as a relative URL reference from the folder `base`. Both paths
    /// are relative to the same root.
    fn href_from<P: AsRef<Path>>(&self, base: P) -> String;
}

impl PathExt for Path {
    fn to_posix(&self) -> String {
        let parts: Vec<_> = self.components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy()),
                Component::ParentDir => Some("..".into()),
                _ => None,
            })
            .collect();

        match parts.is_empty() {
            true => ".".into(),
            false => parts.join("/"),
        }
    }

    fn href_from<P: AsRef<Path>>(&self, base: P) -> String {
        // `diff_paths` treats `.` as a component, so drop it up front.
        let strip = |p: &Path| -> std::path::PathBuf {
            p.components().filter(|c| !matches!(c, Component::CurDir)).collect()
        };

        let (path, base) = (strip(self), strip(base.as_ref()));
        super::diff_paths(&path, &base)
            .map(|p| p.to_posix())
            .unwrap_or_else(|| path.to_posix())
    }
}

impl PathExt for std::path::PathBuf {
    fn to_posix(&self) -> String {
        self.as_path().to_posix()
    }

    fn href_from<P: AsRef<Path>>(&self, base: P) -> String {
        self.as_path().href_from(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posix() {
        assert_eq!(Path::new(".").to_posix(), ".");
        assert_eq!(Path::new("./sub/a").to_posix(), "sub/a");
        assert_eq!(Path::new("").to_posix(), ".");
    }

    #[test]
    fn hrefs() {
        assert_eq!(Path::new("sub/a.html").href_from("."), "sub/a.html");
        assert_eq!(Path::new("./a.html").href_from("sub"), "../a.html");
        assert_eq!(Path::new("sub/x/a.html").href_from("sub"), "x/a.html");
    }
}
