//! Path grammar.
//!
//! Paths are `/`-separated, unrooted, with no empty, `.` or `..` segments.
//! The archive top level is spelled [`ROOT`].

/// The archive top level.
pub const ROOT: &str = ".";

/// Whether `path` is the root or a well-formed archive path.
pub fn is_valid(path: &str) -> bool {
    if path == ROOT {
        return true;
    }
    !path.is_empty() && path.split('/').all(is_valid_segment)
}

/// Whether `name` can stand as a single path segment.
pub fn is_valid_segment(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Split a non-root path into its parent directory and base name.
///
/// `split("a/b/c") == ("a/b", "c")`, `split("a") == (".", "a")`.
pub fn split(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((parent, base)) => (parent, base),
        None => (ROOT, path),
    }
}

/// Row-name prefix shared by every descendant of `dir`.
pub fn child_prefix(dir: &str) -> String {
    if dir == ROOT {
        String::new()
    } else {
        format!("{dir}/")
    }
}

/// Full path of `name` inside `dir`.
pub fn join(dir: &str, name: &str) -> String {
    if dir == ROOT {
        name.to_string()
    } else {
        format!("{dir}/{name}")
    }
}
