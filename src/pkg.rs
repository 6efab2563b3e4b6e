//! Package inference and cross-file symbol resolution.
//!
//! The descriptor set does not carry enough to route a type reference to the
//! file that declares it, so the package name is inferred from the raw
//! `.proto` text: a top-level `package <name>;` statement, or the file's
//! base name when no statement is present.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::util;

#[allow(clippy::expect_used)]
static PACKAGE_STMT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*package\s+(\w+)\s*;").expect("package statement pattern")
});

/// Scan file text for a top-level `package <name>;` statement.
///
/// Leading whitespace and comment lines are tolerated (`^` is per line), as
/// is a trailing inline comment after the `;`. Returns `None` when no
/// statement matches, e.g. for names the `\w+` word class rejects.
pub fn package_statement(text: &str) -> Option<String> {
    PACKAGE_STMT
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Resolves package names for proto files, loading file content from a
/// configured search-path list and caching results for one run.
pub struct PackageResolver {
    proto_path: Vec<PathBuf>,
    // File path -> inferred package name. Lives for a single invocation.
    cache: Mutex<HashMap<String, String>>,
}

impl PackageResolver {
    pub fn new(proto_path: Vec<PathBuf>) -> Self {
        PackageResolver {
            proto_path,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Inferred package name of the file at `path`.
    ///
    /// Falls back to the file's base name with the extension stripped when
    /// the file has no package statement or cannot be found on the search
    /// path; an unresolvable lookup is not an error here, the caller decides
    /// what a miss means.
    pub fn package_name(&self, path: &str) -> String {
        if let Ok(cache) = self.cache.lock() {
            if let Some(hit) = cache.get(path) {
                return hit.clone();
            }
        }
        let pkg = self
            .load(path)
            .as_deref()
            .and_then(package_statement)
            .unwrap_or_else(|| util::strip_ext(util::base(path)).to_string());
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(path.to_string(), pkg.clone());
        }
        pkg
    }

    /// Locate the file declaring `package` as seen from `current_file`.
    ///
    /// The current file's own package wins first, then the declared
    /// dependencies in order. `None` when nothing matches.
    pub fn declaring_file(
        &self,
        package: &str,
        current_file: &str,
        dependencies: &[String],
    ) -> Option<String> {
        if self.package_name(current_file) == package {
            return Some(current_file.to_string());
        }
        dependencies
            .iter()
            .find(|dep| self.package_name(dep) == package)
            .cloned()
    }

    fn load(&self, path: &str) -> Option<String> {
        for dir in &self.proto_path {
            if let Ok(text) = fs::read_to_string(dir.join(path)) {
                return Some(text);
            }
        }
        fs::read_to_string(path).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_package_statement() {
        let cases = [
            ("package foobar3;\n", Some("foobar3")),
            ("package foobar3   \t; \n", Some("foobar3")),
            ("package foo-bar3;\n", None),
            ("// package notIt;\n  package 3eggs3;\n", Some("3eggs3")),
            ("syntax = \"proto2\";\n\npackage views; // comment\n", Some("views")),
            ("message NoPackage {}\n", None),
        ];
        for (text, want) in cases {
            assert_eq!(
                package_statement(text).as_deref(),
                want,
                "package_statement({text:?})"
            );
        }
    }

    #[test]
    fn package_name_prefers_statement_and_falls_back_to_stem() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("views.proto")).unwrap();
        writeln!(f, "package my_views;").unwrap();

        let resolver = PackageResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(resolver.package_name("views.proto"), "my_views");
        // Not on disk anywhere: stem fallback.
        assert_eq!(resolver.package_name("missing/thing.proto"), "thing");
    }

    #[test]
    fn package_name_is_cached_for_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cached.proto");
        std::fs::write(&path, "package first;\n").unwrap();

        let resolver = PackageResolver::new(vec![dir.path().to_path_buf()]);
        assert_eq!(resolver.package_name("cached.proto"), "first");
        std::fs::write(&path, "package second;\n").unwrap();
        // Still the cached answer within this run.
        assert_eq!(resolver.package_name("cached.proto"), "first");
    }

    #[test]
    fn declaring_file_checks_current_then_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.proto"), "package alpha;\n").unwrap();
        std::fs::write(dir.path().join("b.proto"), "package beta;\n").unwrap();

        let resolver = PackageResolver::new(vec![dir.path().to_path_buf()]);
        let deps = vec!["b.proto".to_string()];
        assert_eq!(
            resolver.declaring_file("alpha", "a.proto", &deps),
            Some("a.proto".to_string())
        );
        assert_eq!(
            resolver.declaring_file("beta", "a.proto", &deps),
            Some("b.proto".to_string())
        );
        assert_eq!(resolver.declaring_file("gamma", "a.proto", &deps), None);
    }
}
