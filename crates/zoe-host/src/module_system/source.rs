// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Source providers - retrieve module source text for an identifier

use crate::error::{LoaderError, Result};
use crate::host::fs;
use crate::module_system::resolver::{self, ModuleId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::rc::Rc;

/// Retrieves raw module source for a canonical identifier.
///
/// The registry's load path guarantees at most one `fetch` per identifier.
/// `fetch_sync` serves engine loaders that resolve imports without
/// suspending; such engines keep their own per-identifier module map.
#[async_trait(?Send)]
pub trait SourceProvider {
    /// Fetch the source text of `id`
    async fn fetch(&self, id: &ModuleId) -> Result<String>;

    /// Fetch the source text of `id` without suspending.
    ///
    /// Providers that can only fetch asynchronously report the scheme as
    /// unsupported.
    fn fetch_sync(&self, id: &ModuleId) -> Result<String> {
        Err(LoaderError::unsupported_scheme(id.as_str(), id.scheme()))
    }
}

#[async_trait(?Send)]
impl<P: SourceProvider + ?Sized> SourceProvider for Rc<P> {
    async fn fetch(&self, id: &ModuleId) -> Result<String> {
        (**self).fetch(id).await
    }

    fn fetch_sync(&self, id: &ModuleId) -> Result<String> {
        (**self).fetch_sync(id)
    }
}

#[async_trait(?Send)]
impl<P: SourceProvider + ?Sized> SourceProvider for Box<P> {
    async fn fetch(&self, id: &ModuleId) -> Result<String> {
        (**self).fetch(id).await
    }

    fn fetch_sync(&self, id: &ModuleId) -> Result<String> {
        (**self).fetch_sync(id)
    }
}

/// Reads `file:` identifiers from the local filesystem
#[derive(Debug, Clone, Copy, Default)]
pub struct FileSourceProvider;

#[async_trait(?Send)]
impl SourceProvider for FileSourceProvider {
    async fn fetch(&self, id: &ModuleId) -> Result<String> {
        let path = resolver::to_file_path(id)?;

        // The host read is synchronous; run it off the loop so concurrent
        // loads of other modules keep making progress.
        let read = tokio::task::spawn_blocking(move || fs::read_text_file_sync(&path)).await;

        match read {
            Ok(Ok(source)) => Ok(source),
            Ok(Err(e)) => Err(LoaderError::from_host(id.as_str(), e)),
            Err(join) => Err(LoaderError::Io {
                module: id.to_string(),
                message: join.to_string(),
            }),
        }
    }

    fn fetch_sync(&self, id: &ModuleId) -> Result<String> {
        let path = resolver::to_file_path(id)?;
        fs::read_text_file_sync(&path).map_err(|e| LoaderError::from_host(id.as_str(), e))
    }
}

/// Dispatches fetches to a provider registered for the identifier's scheme
#[derive(Default)]
pub struct SchemeProviders {
    providers: HashMap<String, Box<dyn SourceProvider>>,
}

impl SchemeProviders {
    /// Create an empty set; every fetch fails with `UnsupportedScheme`
    pub fn new() -> Self {
        Self::default()
    }

    /// Local files only. Remote schemes stay unsupported.
    pub fn with_defaults() -> Self {
        let mut providers = Self::new();
        providers.register("file", FileSourceProvider);
        providers
    }

    /// Register (or replace) the provider for `scheme`
    pub fn register(&mut self, scheme: impl Into<String>, provider: impl SourceProvider + 'static) {
        let scheme = scheme.into().to_ascii_lowercase();
        tracing::debug!("registered source provider for '{}:'", scheme);
        self.providers.insert(scheme, Box::new(provider));
    }

    fn provider(&self, id: &ModuleId) -> Result<&dyn SourceProvider> {
        self.providers
            .get(id.scheme())
            .map(|provider| &**provider)
            .ok_or_else(|| LoaderError::unsupported_scheme(id.as_str(), id.scheme()))
    }
}

#[async_trait(?Send)]
impl SourceProvider for SchemeProviders {
    async fn fetch(&self, id: &ModuleId) -> Result<String> {
        self.provider(id)?.fetch(id).await
    }

    fn fetch_sync(&self, id: &ModuleId) -> Result<String> {
        self.provider(id)?.fetch_sync(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_file_provider_reads_source() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("main.js");
        std::fs::write(&path, "export const x = 1;").unwrap();

        let id = resolver::resolve_file_path(path.to_str().unwrap(), &ModuleId::parse("file:///").unwrap())
            .unwrap();
        let source = FileSourceProvider.fetch(&id).await.unwrap();
        assert_eq!(source, "export const x = 1;");
    }

    #[tokio::test]
    async fn test_file_provider_missing_file_is_not_found() {
        let dir = tempdir().unwrap();
        let id = ModuleId::from_directory_path(dir.path())
            .and_then(|base| resolver::resolve("missing.js", &base))
            .unwrap();

        let err = FileSourceProvider.fetch(&id).await.unwrap_err();
        assert_eq!(err, LoaderError::NotFound(id.to_string()));
    }

    #[tokio::test]
    async fn test_remote_schemes_are_unsupported() {
        let providers = SchemeProviders::with_defaults();
        let id = ModuleId::parse("https://server/path/to/foo.js").unwrap();

        assert!(matches!(
            providers.fetch(&id).await,
            Err(LoaderError::UnsupportedScheme { ref scheme, .. }) if scheme == "https"
        ));
        assert!(matches!(
            providers.fetch_sync(&id),
            Err(LoaderError::UnsupportedScheme { ref scheme, .. }) if scheme == "https"
        ));
    }

    #[test]
    fn test_sync_fetch_dispatches_by_scheme() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("dep.js"), "export default 2;").unwrap();
        let base = ModuleId::from_directory_path(dir.path()).unwrap();
        let providers = SchemeProviders::with_defaults();

        let id = resolver::resolve("./dep.js", &base).unwrap();
        assert_eq!(providers.fetch_sync(&id).unwrap(), "export default 2;");

        let missing = resolver::resolve("./gone.js", &base).unwrap();
        assert_eq!(providers.fetch_sync(&missing), Err(LoaderError::NotFound(missing.to_string())));
    }
}
