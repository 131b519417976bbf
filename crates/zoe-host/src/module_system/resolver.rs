// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module specifier resolution
//!
//! Specifiers are resolved with WHATWG URL joining against a base identifier.
//! The resulting URL, with its fragment removed, is the canonical
//! [`ModuleId`] used as the registry key.

use crate::error::{LoaderError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

/// Canonical module identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(Url);

impl ModuleId {
    /// Parse an absolute identifier, normalizing it
    pub fn parse(input: &str) -> Result<Self> {
        let url = Url::parse(input)
            .map_err(|e| LoaderError::invalid_specifier(input, e.to_string()))?;
        Ok(Self::from_url(url))
    }

    /// Wrap a URL, dropping its fragment
    pub fn from_url(mut url: Url) -> Self {
        url.set_fragment(None);
        Self(url)
    }

    /// Identifier for a local directory (always ends with `/`)
    pub fn from_directory_path(path: &Path) -> Result<Self> {
        let url = Url::from_directory_path(path).map_err(|_| {
            LoaderError::invalid_specifier(path.display().to_string(), "not an absolute path")
        })?;
        Self::parse(url.as_str())
    }

    /// The URL scheme (`file`, `https`, ...)
    pub fn scheme(&self) -> &str {
        self.0.scheme()
    }

    /// The identifier as a string
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// The underlying URL
    pub fn as_url(&self) -> &Url {
        &self.0
    }

    /// Whether the identifier names a directory
    pub fn is_directory(&self) -> bool {
        self.0.path().ends_with('/')
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Resolve a module specifier against a base identifier.
///
/// `base` is the importing module's identifier, or the working directory
/// identifier for the program entry.
pub fn resolve(specifier: &str, base: &ModuleId) -> Result<ModuleId> {
    if specifier.trim().is_empty() {
        return Err(LoaderError::invalid_specifier(specifier, "empty specifier"));
    }
    if base.as_url().cannot_be_a_base() {
        return Err(LoaderError::invalid_specifier(
            specifier,
            format!("'{}' cannot be used as a base", base),
        ));
    }

    let url = Url::options()
        .base_url(Some(base.as_url()))
        .parse(specifier)
        .map_err(|e| LoaderError::invalid_specifier(specifier, e.to_string()))?;

    tracing::trace!("resolved '{}' against '{}' to '{}'", specifier, base, url);
    Ok(ModuleId::from_url(url))
}

/// Resolve a native file path against a directory identifier.
///
/// Absolute paths are used as-is, relative ones are joined onto `base`,
/// which must be a `file:` identifier.
pub fn resolve_file_path(path: &str, base: &ModuleId) -> Result<ModuleId> {
    if path.trim().is_empty() {
        return Err(LoaderError::invalid_specifier(path, "empty path"));
    }

    let native = Path::new(path);
    let absolute = if native.is_absolute() {
        native.to_path_buf()
    } else {
        let dir = to_file_path(base)?;
        let dir = if base.is_directory() {
            dir
        } else {
            dir.parent().map(Path::to_path_buf).unwrap_or(dir)
        };
        dir.join(native)
    };

    let url = Url::from_file_path(&absolute)
        .map_err(|_| LoaderError::invalid_specifier(path, "not representable as a file URL"))?;

    // Re-parse so `.` and `..` components collapse like any other specifier.
    ModuleId::parse(url.as_str())
}

/// Convert a `file:` identifier back into a native path
pub fn to_file_path(id: &ModuleId) -> Result<PathBuf> {
    if id.scheme() != "file" {
        return Err(LoaderError::unsupported_scheme(id.as_str(), id.scheme()));
    }
    id.as_url()
        .to_file_path()
        .map_err(|_| LoaderError::invalid_specifier(id.as_str(), "not a local file URL"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> ModuleId {
        ModuleId::parse("file:///work/app/").unwrap()
    }

    #[test]
    fn test_relative_specifiers_normalize_to_same_id() {
        let a = resolve("./lib/util.js", &base()).unwrap();
        let b = resolve("lib/../lib/./util.js", &base()).unwrap();
        let c = resolve("file:///work/app/lib/util.js", &base()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "file:///work/app/lib/util.js");
    }

    #[test]
    fn test_resolve_against_importing_module() {
        let importer = ModuleId::parse("file:///work/app/src/main.js").unwrap();
        let id = resolve("../util.js", &importer).unwrap();
        assert_eq!(id.as_str(), "file:///work/app/util.js");
    }

    #[test]
    fn test_fragment_is_dropped_query_kept() {
        let a = resolve("./a.js#top", &base()).unwrap();
        let b = resolve("./a.js", &base()).unwrap();
        assert_eq!(a, b);

        let q = resolve("./a.js?v=1", &base()).unwrap();
        assert_ne!(q, b);
    }

    #[test]
    fn test_absolute_url_resolves_to_itself() {
        let id = resolve("https://server/path/to/foo.js", &base()).unwrap();
        assert_eq!(id.as_str(), "https://server/path/to/foo.js");
        assert_eq!(id.scheme(), "https");
    }

    #[test]
    fn test_empty_specifier_is_invalid() {
        assert!(matches!(
            resolve("", &base()),
            Err(LoaderError::InvalidSpecifier { .. })
        ));
        assert!(matches!(
            resolve("   ", &base()),
            Err(LoaderError::InvalidSpecifier { .. })
        ));
    }

    #[test]
    fn test_opaque_base_is_rejected() {
        let opaque = ModuleId::parse("data:text/plain,hello").unwrap();
        assert!(matches!(
            resolve("./a.js", &opaque),
            Err(LoaderError::InvalidSpecifier { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_file_path() {
        let id = resolve_file_path("scripts/../main.js", &base()).unwrap();
        assert_eq!(id.as_str(), "file:///work/app/main.js");

        let abs = resolve_file_path("/etc/zoe/main.js", &base()).unwrap();
        assert_eq!(abs.as_str(), "file:///etc/zoe/main.js");

        let from_module =
            resolve_file_path("b.js", &ModuleId::parse("file:///work/a.js").unwrap()).unwrap();
        assert_eq!(from_module.as_str(), "file:///work/b.js");
    }

    #[cfg(unix)]
    #[test]
    fn test_to_file_path() {
        let id = ModuleId::parse("file:///work/app/main.js").unwrap();
        assert_eq!(to_file_path(&id).unwrap(), PathBuf::from("/work/app/main.js"));

        let remote = ModuleId::parse("https://server/foo.js").unwrap();
        assert!(matches!(
            to_file_path(&remote),
            Err(LoaderError::UnsupportedScheme { .. })
        ));
    }
}
