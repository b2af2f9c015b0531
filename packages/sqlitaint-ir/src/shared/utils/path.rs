//! Lexical path normalization
//!
//! Include targets and autoload candidates are matched against script paths
//! as plain strings, so `./` and `dir/../` segments must be folded away
//! without touching the filesystem (symlinks are not resolved).

use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` components; `..` above the root is dropped
pub fn normalize_path(path: &str) -> String {
    normalize(Path::new(path)).to_string_lossy().into_owned()
}

pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    // count of `..` kept at the front of a relative path
    let mut leading_parents = 0usize;
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    out.pop();
                    depth -= 1;
                } else if !out.has_root() {
                    out.push("..");
                    leading_parents += 1;
                }
            }
            Component::Normal(name) => {
                out.push(name);
                depth += 1;
            }
        }
    }
    if out.as_os_str().is_empty() && leading_parents == 0 {
        out.push(".");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folds_current_and_parent() {
        assert_eq!(normalize_path("/app/./lib/../inc/db.php"), "/app/inc/db.php");
        assert_eq!(normalize_path("/app/src/../../etc"), "/etc");
    }

    #[test]
    fn test_parent_above_root_is_dropped() {
        assert_eq!(normalize_path("/../a.php"), "/a.php");
    }

    #[test]
    fn test_relative_paths_keep_leading_parents() {
        assert_eq!(normalize_path("../lib/a.php"), "../lib/a.php");
        assert_eq!(normalize_path("a/../../b.php"), "../b.php");
        assert_eq!(normalize_path("./a/.."), ".");
    }

    #[test]
    fn test_clean_path_unchanged() {
        assert_eq!(normalize_path("/var/www/index.php"), "/var/www/index.php");
    }
}
