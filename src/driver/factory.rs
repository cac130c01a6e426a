use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{DisplayDriver, DriverError, Result};
use crate::protocol::OpenParameters;

/// Open parameter naming the driver type to create
pub const DRIVER_TYPE_PARAMETER: &str = "remoteDisplayType";

/// Builds a driver for one image
pub type DriverCreator =
    Arc<dyn Fn(&OpenParameters) -> Result<Box<dyn DisplayDriver>> + Send + Sync>;

/// Registry of display driver creators keyed by type name.
///
/// The type is taken from the [`DRIVER_TYPE_PARAMETER`] string parameter,
/// falling back to the configured default.
#[derive(Clone, Default)]
pub struct DriverFactory {
    creators: HashMap<String, DriverCreator>,
    default_driver: Option<String>,
}

impl DriverFactory {
    /// Empty factory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `creator` under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, creator: F) -> &mut Self
    where
        F: Fn(&OpenParameters) -> Result<Box<dyn DisplayDriver>> + Send + Sync + 'static,
    {
        self.creators.insert(name.into(), Arc::new(creator));
        self
    }

    /// Builder form of [`DriverFactory::register`]
    #[must_use]
    pub fn with_driver<F>(mut self, name: impl Into<String>, creator: F) -> Self
    where
        F: Fn(&OpenParameters) -> Result<Box<dyn DisplayDriver>> + Send + Sync + 'static,
    {
        self.register(name, creator);
        self
    }

    /// Driver type used when the parameters do not name one
    pub fn set_default(&mut self, name: impl Into<String>) -> &mut Self {
        self.default_driver = Some(name.into());
        self
    }

    /// Builder form of [`DriverFactory::set_default`]
    #[must_use]
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.set_default(name);
        self
    }

    /// Configured default driver type
    #[must_use]
    pub fn default_driver(&self) -> Option<&str> {
        self.default_driver.as_deref()
    }

    /// Whether a creator is registered under `name`
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.creators.contains_key(name)
    }

    /// Registered type names, sorted
    #[must_use]
    pub fn driver_names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.creators.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Create the driver `open` asks for
    pub fn create(&self, open: &OpenParameters) -> Result<Box<dyn DisplayDriver>> {
        let type_name = open
            .string_parameter(DRIVER_TYPE_PARAMETER)
            .or(self.default_driver.as_deref())
            .ok_or(DriverError::NoDriverType)?;

        let creator = self
            .creators
            .get(type_name)
            .ok_or_else(|| DriverError::UnknownDriverType(type_name.to_string()))?;

        debug!(driver = type_name, "creating display driver");
        creator(open)
    }
}

impl fmt::Debug for DriverFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverFactory")
            .field("drivers", &self.driver_names())
            .field("default_driver", &self.default_driver)
            .finish()
    }
}
