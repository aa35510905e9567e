//! Service registry: resources acquired by a test that must be released when
//! it ends, whatever way it ends.

use crate::errors::HarnessError;
use crate::reporter::panic_message;
use std::error::Error;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

pub type ReleaseError = Box<dyn Error + Send + Sync>;

/// A test resource with a release step. Taking `Box<Self>` means a service
/// can be released at most once.
pub trait Service: Send {
    fn release(self: Box<Self>) -> Result<(), ReleaseError>;

    /// Label used when a release fails.
    fn name(&self) -> &str {
        "service"
    }
}

/// Adapts a cleanup closure into a [`Service`].
pub struct FnService<F> {
    name: String,
    cleanup: F,
}

impl<F> FnService<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send,
{
    pub fn new(name: impl Into<String>, cleanup: F) -> Self {
        Self {
            name: name.into(),
            cleanup,
        }
    }
}

impl<F> Service for FnService<F>
where
    F: FnOnce() -> Result<(), ReleaseError> + Send,
{
    fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        (self.cleanup)()
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> fmt::Debug for FnService<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnService").field("name", &self.name).finish()
    }
}

impl Service for tempfile::TempDir {
    fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        (*self).close().map_err(Into::into)
    }

    fn name(&self) -> &str {
        "temp dir"
    }
}

impl Service for std::fs::File {
    fn release(self: Box<Self>) -> Result<(), ReleaseError> {
        // Dropping closes the descriptor; flush first so write errors surface.
        self.sync_all().map_err(Into::into)
    }

    fn name(&self) -> &str {
        "file"
    }
}

/// One release that went wrong.
#[derive(Debug)]
pub struct ReleaseFailure {
    pub name: String,
    pub error: ReleaseError,
}

impl fmt::Display for ReleaseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error closing service '{}': {}", self.name, self.error)
    }
}

impl From<ReleaseFailure> for HarnessError {
    fn from(failure: ReleaseFailure) -> Self {
        HarnessError::Service {
            name: failure.name,
            reason: failure.error.to_string(),
        }
    }
}

/// Services in acquisition order.
#[derive(Default)]
pub struct ServiceRegistry {
    services: Vec<Box<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, service: Box<dyn Service>) {
        self.services.push(service);
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Releases everything, newest first. A failing or panicking release is
    /// logged and does not stop the rest. The registry is empty afterwards,
    /// so calling this again does nothing.
    pub fn release_all(&mut self) -> Vec<ReleaseFailure> {
        let mut failures = Vec::new();
        while let Some(service) = self.services.pop() {
            let name = service.name().to_string();
            let released = panic::catch_unwind(AssertUnwindSafe(|| service.release()))
                .unwrap_or_else(|payload| Err(panic_message(payload.as_ref()).into()));
            if let Err(error) = released {
                tracing::warn!(service = %name, error = %error, "service release failed");
                failures.push(ReleaseFailure { name, error });
            }
        }
        failures
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.services.iter().map(|s| s.name()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Box<dyn Service> {
        let log = Arc::clone(log);
        Box::new(FnService::new(name, move || {
            log.lock().unwrap().push(name);
            Ok(())
        }))
    }

    #[test]
    fn releases_in_reverse_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording(&log, "X"));
        registry.register(recording(&log, "Y"));
        registry.register(recording(&log, "Z"));

        assert!(registry.release_all().is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["Z", "Y", "X"]);
    }

    #[test]
    fn failing_release_does_not_stop_the_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording(&log, "first"));
        registry.register(Box::new(FnService::new("broken", || Err("disk on fire".into()))));
        registry.register(recording(&log, "last"));

        let failures = registry.release_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].name, "broken");
        assert!(failures[0].to_string().contains("disk on fire"));
        assert_eq!(*log.lock().unwrap(), vec!["last", "first"]);
        let error = HarnessError::from(failures.into_iter().next().unwrap());
        assert_eq!(error.to_string(), "service 'broken' failed to release: disk on fire");
    }

    #[test]
    fn panicking_release_is_contained() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording(&log, "survivor"));
        registry.register(Box::new(FnService::new("panicky", || panic!("release exploded"))));

        let failures = registry.release_all();
        assert_eq!(failures.len(), 1);
        assert!(failures[0].error.to_string().contains("release exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
    }

    #[test]
    fn second_release_is_a_no_op() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = ServiceRegistry::new();
        registry.register(recording(&log, "once"));
        registry.release_all();
        registry.release_all();
        assert_eq!(*log.lock().unwrap(), vec!["once"]);
        assert!(registry.is_empty());
    }

    #[test]
    fn temp_dir_service_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();
        let mut registry = ServiceRegistry::new();
        registry.register(Box::new(dir));
        assert!(path.exists());
        registry.release_all();
        assert!(!path.exists());
    }
}
