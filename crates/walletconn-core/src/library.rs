//! The `getLibrary` transform
//!
//! Maps the connector's raw provider to the object the application works
//! with. It is registered once: the first registration wins and later ones
//! are ignored, so a session never switches libraries halfway through.

use std::sync::{Arc, OnceLock};

use walletconn_types::{Library, Provider, Result, SessionError};

pub type LibraryTransform = Arc<dyn Fn(&Provider) -> Library + Send + Sync>;

/// Wrap any closure as a [`LibraryTransform`].
pub fn library_transform<F>(f: F) -> LibraryTransform
where
    F: Fn(&Provider) -> Library + Send + Sync + 'static,
{
    Arc::new(f)
}

/// The transform that hands the provider itself to the application.
pub fn identity_library() -> LibraryTransform {
    library_transform(Library::from_provider)
}

pub(crate) struct LibrarySlot {
    transform: OnceLock<LibraryTransform>,
}

impl LibrarySlot {
    pub fn new(initial: Option<LibraryTransform>) -> Self {
        let transform = OnceLock::new();
        if let Some(initial) = initial {
            let _ = transform.set(initial);
        }
        Self { transform }
    }

    /// Returns `false` when a transform was already registered.
    pub fn register(&self, transform: LibraryTransform) -> bool {
        let registered = self.transform.set(transform).is_ok();
        if !registered {
            tracing::debug!("library transform already registered, ignoring new registration");
        }
        registered
    }

    pub fn is_set(&self) -> bool {
        self.transform.get().is_some()
    }

    pub fn build(&self, provider: &Provider) -> Result<Library> {
        let transform = self
            .transform
            .get()
            .ok_or(SessionError::LibraryTransformUnset)?;
        Ok(transform(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_registration_wins() {
        let slot = LibrarySlot::new(None);
        assert!(!slot.is_set());
        assert!(slot.register(library_transform(|_| Library::new("first"))));
        assert!(!slot.register(library_transform(|_| Library::new("second"))));

        let library = slot.build(&Provider::new(())).unwrap();
        assert_eq!(library.downcast_ref::<&str>(), Some(&"first"));
    }

    #[test]
    fn test_configured_transform_blocks_registration() {
        let slot = LibrarySlot::new(Some(identity_library()));
        assert!(!slot.register(library_transform(|_| Library::new(0u8))));

        let provider = Provider::new(7u32);
        assert!(slot.build(&provider).unwrap().is_provider(&provider));
    }

    #[test]
    fn test_unset_transform_is_an_error() {
        let slot = LibrarySlot::new(None);
        assert_eq!(
            slot.build(&Provider::new(())).unwrap_err(),
            SessionError::LibraryTransformUnset
        );
    }
}
