//! Connection manager configuration

use crate::library::{library_transform, LibraryTransform};
use walletconn_types::{Library, Provider};

/// Configuration for a [`ConnectionManager`](crate::ConnectionManager).
#[derive(Clone, Default)]
pub struct ManagerConfig {
    /// The `getLibrary` transform. May instead be registered later with
    /// [`ConnectionManager::register_library`](crate::ConnectionManager::register_library).
    pub library: Option<LibraryTransform>,
    /// Default error channel for `activate` when the call gives no callback:
    /// `true` returns the error, `false` resets the state and logs.
    pub throw_errors: bool,
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library<F>(mut self, f: F) -> Self
    where
        F: Fn(&Provider) -> Library + Send + Sync + 'static,
    {
        self.library = Some(library_transform(f));
        self
    }

    pub fn with_transform(mut self, transform: LibraryTransform) -> Self {
        self.library = Some(transform);
        self
    }

    pub fn throw_errors(mut self, throw_errors: bool) -> Self {
        self.throw_errors = throw_errors;
        self
    }
}

impl std::fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("library", &self.library.as_ref().map(|_| "<transform>"))
            .field("throw_errors", &self.throw_errors)
            .finish()
    }
}
