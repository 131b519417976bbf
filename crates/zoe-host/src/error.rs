// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the host bridge and module loader

use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors produced while resolving, fetching, evaluating or running a module.
///
/// Loader errors are `Clone`: a single terminal failure is handed to every
/// waiter of a load and re-raised by every later `load` of the same module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoaderError {
    /// Empty or malformed module reference
    #[error("Invalid module specifier '{specifier}': {reason}")]
    InvalidSpecifier {
        /// The offending specifier
        specifier: String,
        /// Why it could not be resolved
        reason: String,
    },

    /// The module resource does not exist
    #[error("Cannot find module '{0}'")]
    NotFound(String),

    /// Any other failure while reading a module resource
    #[error("Error reading module '{module}': {message}")]
    Io {
        /// Module identifier
        module: String,
        /// Host error message
        message: String,
    },

    /// No source provider is registered for the identifier's scheme
    #[error("Unsupported scheme '{scheme}' in module '{module}'")]
    UnsupportedScheme {
        /// Module identifier
        module: String,
        /// URL scheme
        scheme: String,
    },

    /// The engine failed to evaluate the module source
    #[error("{0}")]
    Evaluation(String),

    /// The module's entry point failed
    #[error("Entry point of '{module}' failed: {message}")]
    EntryFailed {
        /// Module identifier
        module: String,
        /// Engine error message
        message: String,
    },
}

impl LoaderError {
    /// Create an invalid specifier error
    pub fn invalid_specifier(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an unsupported scheme error
    pub fn unsupported_scheme(module: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnsupportedScheme {
            module: module.into(),
            scheme: scheme.into(),
        }
    }

    /// Map a host read failure onto the loader taxonomy
    pub fn from_host(module: impl Into<String>, error: HostError) -> Self {
        let module = module.into();
        match error {
            HostError::Io { ref code, .. } if code == "ENOENT" => Self::NotFound(module),
            other => Self::Io {
                module,
                message: other.to_string(),
            },
        }
    }
}

/// Errors raised by the native host capability surface
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// An operating system error, carrying a libuv-style code name
    #[error("{code}: {message}")]
    Io {
        /// Error code name (`ENOENT`, `EACCES`, ...)
        code: String,
        /// Human readable message
        message: String,
    },

    /// The handle is closed or was never opened
    #[error("Bad handle: {0}")]
    BadHandle(String),

    /// The identifier cannot be mapped onto a local path
    #[error("Not a file URL: {0}")]
    NotAFileUrl(String),

    /// A host primitive dropped its callback without calling it
    #[error("Host callback dropped before completion")]
    CallbackDropped,

    /// A child process could not be spawned
    #[error("Failed to spawn '{command}': {message}")]
    Spawn {
        /// Program that was requested
        command: String,
        /// Operating system message
        message: String,
    },
}

/// Errors raised while reading configuration files
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Cannot read config '{path}': {message}")]
    Read {
        /// File path
        path: String,
        /// Operating system message
        message: String,
    },

    /// The file is not a valid configuration object
    #[error("Invalid config '{path}': {message}")]
    Parse {
        /// File path
        path: String,
        /// Parser message
        message: String,
    },
}

impl From<std::io::Error> for HostError {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match error.kind() {
            ErrorKind::NotFound => "ENOENT",
            ErrorKind::PermissionDenied => "EACCES",
            ErrorKind::AlreadyExists => "EEXIST",
            ErrorKind::InvalidInput => "EINVAL",
            ErrorKind::InvalidData => "EILSEQ",
            ErrorKind::NotADirectory => "ENOTDIR",
            ErrorKind::IsADirectory => "EISDIR",
            ErrorKind::Interrupted => "EINTR",
            _ => "EIO",
        };
        Self::Io {
            code: code.to_string(),
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = LoaderError::from_host("file:///a.js", HostError::from(io));
        assert_eq!(err, LoaderError::NotFound("file:///a.js".to_string()));
    }

    #[test]
    fn test_other_host_failures_map_to_io() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = LoaderError::from_host("file:///a.js", HostError::from(io));
        assert!(matches!(err, LoaderError::Io { ref module, .. } if module == "file:///a.js"));
        assert!(err.to_string().contains("EACCES"));
    }
}
