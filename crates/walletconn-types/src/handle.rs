//! Opaque provider and library handles
//!
//! The session never looks inside these. A [`Provider`] comes from the
//! connector; a [`Library`] is what the application's transform built from it.

use std::any::Any;
use std::sync::Arc;

macro_rules! opaque_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $name(Arc<dyn Any + Send + Sync>);

        impl $name {
            pub fn new<T: Any + Send + Sync>(value: T) -> Self {
                Self(Arc::new(value))
            }

            /// Borrow the wrapped value if it is a `T`.
            pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
                self.0.downcast_ref::<T>()
            }

            /// Whether both handles wrap the very same allocation.
            pub fn ptr_eq(&self, other: &Self) -> bool {
                Arc::ptr_eq(&self.0, &other.0)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({:p})"), Arc::as_ptr(&self.0))
            }
        }
    };
}

opaque_handle!(
    /// Low-level handle returned by a connector (an EIP-1193 provider, an RPC client, ...).
    Provider
);

opaque_handle!(
    /// Application-facing object derived from a [`Provider`].
    Library
);

impl Library {
    /// Wrap a provider as its own library (the identity transform).
    pub fn from_provider(provider: &Provider) -> Self {
        Self(provider.0.clone())
    }

    /// Whether this library is the provider itself, unwrapped.
    pub fn is_provider(&self, provider: &Provider) -> bool {
        Arc::ptr_eq(&self.0, &provider.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downcast_and_identity() {
        let provider = Provider::new(String::from("eip1193"));
        assert_eq!(provider.downcast_ref::<String>().map(String::as_str), Some("eip1193"));
        assert!(provider.downcast_ref::<u64>().is_none());

        let library = Library::from_provider(&provider);
        assert!(library.is_provider(&provider));
        assert!(!Library::new(1u8).is_provider(&provider));
        assert!(provider.ptr_eq(&provider.clone()));
    }
}
