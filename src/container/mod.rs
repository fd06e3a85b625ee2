//! Service container: application services looked up by type or by name.
//!
//! The container is filled once while the application is assembled and then
//! shared read-only (behind an `Arc`) with every request [`Context`]. Named
//! entries cover the "one instance per configuration key" case, e.g. two
//! different cache services registered as `"cache.pages"` and `"cache.api"`.
//!
//! [`Context`]: crate::context::Context

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::error::HttpError;

type Service = Arc<dyn Any + Send + Sync>;

/// Errors raised by [`Container`] lookups and registrations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContainerError {
    #[error("service {name:?} is not registered")]
    NotFound { name: String },

    #[error("service {name:?} is already registered and cannot be replaced")]
    ReadOnly { name: String },

    #[error("service {name:?} is not a {expected}")]
    TypeMismatch { name: String, expected: &'static str },
}

impl From<ContainerError> for HttpError {
    fn from(err: ContainerError) -> Self {
        HttpError::service_unavailable(err)
    }
}

/// Type- and name-keyed service registry.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use haven::container::Container;
///
/// struct Renderer { theme: &'static str }
///
/// let mut services = Container::new();
/// services.insert(Renderer { theme: "dark" });
/// services.insert_named("greeting", String::from("hello")).unwrap();
///
/// assert_eq!(services.get::<Renderer>().unwrap().theme, "dark");
/// let greeting: Arc<String> = services.get_named("greeting").unwrap();
/// assert_eq!(greeting.as_str(), "hello");
/// ```
#[derive(Default)]
pub struct Container {
    by_type: HashMap<TypeId, Service>,
    by_name: HashMap<String, Service>,
}

impl Container {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` as the service for its type, replacing any previous one.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.by_type.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Get the service registered for type `T`.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.by_type
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Remove the service registered for type `T`.
    pub fn remove<T>(&mut self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.by_type
            .remove(&TypeId::of::<T>())
            .and_then(|service| service.downcast::<T>().ok())
    }

    /// Register a named service. Names are write-once.
    pub fn insert_named<T>(&mut self, name: impl Into<String>, value: T) -> Result<(), ContainerError>
    where
        T: Send + Sync + 'static,
    {
        let name = name.into();
        if self.by_name.contains_key(&name) {
            return Err(ContainerError::ReadOnly { name });
        }
        self.by_name.insert(name, Arc::new(value));
        Ok(())
    }

    /// Look up a named service and check its type.
    pub fn get_named<T>(&self, name: &str) -> Result<Arc<T>, ContainerError>
    where
        T: Send + Sync + 'static,
    {
        let service = self
            .by_name
            .get(name)
            .cloned()
            .ok_or_else(|| ContainerError::NotFound {
                name: name.to_owned(),
            })?;
        service
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                name: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// `true` if a service is registered under `name`.
    pub fn contains_named(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.by_name.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("typed", &self.by_type.len())
            .field("named", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Mailer(&'static str);

    #[test]
    fn typed_services_replace_and_remove() {
        let mut c = Container::new();
        c.insert(Mailer("smtp"));
        c.insert(Mailer("sendmail"));
        assert_eq!(*c.get::<Mailer>().unwrap(), Mailer("sendmail"));
        assert!(c.remove::<Mailer>().is_some());
        assert!(c.get::<Mailer>().is_none());
    }

    #[test]
    fn named_services_are_write_once() {
        let mut c = Container::new();
        c.insert_named("mailer", Mailer("smtp")).unwrap();
        assert_eq!(
            c.insert_named("mailer", Mailer("other")),
            Err(ContainerError::ReadOnly {
                name: "mailer".to_owned()
            })
        );
        assert!(c.contains_named("mailer"));
        assert_eq!(c.names(), vec!["mailer"]);
    }

    #[test]
    fn named_lookup_errors() {
        let mut c = Container::new();
        c.insert_named("n", 42_u32).unwrap();
        assert!(matches!(
            c.get_named::<u32>("missing"),
            Err(ContainerError::NotFound { .. })
        ));
        assert!(matches!(
            c.get_named::<String>("n"),
            Err(ContainerError::TypeMismatch { .. })
        ));
        assert_eq!(*c.get_named::<u32>("n").unwrap(), 42);
    }

    #[test]
    fn lookup_failure_maps_to_503() {
        let err: HttpError = ContainerError::NotFound { name: "db".into() }.into();
        assert_eq!(err.status().as_u16(), 503);
    }
}
