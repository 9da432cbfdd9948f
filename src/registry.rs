//! Process wide backend registry.
//!
//! Drivers register a factory under their name, usually from their crate's
//! initialization code, and sessions look the factory up by the backend name
//! of the connection parameters. Registration is expected to be complete
//! before the first session opens; after that the registry is only read.

use std::{
    collections::HashMap,
    sync::{Arc, LazyLock, Mutex},
};

use crate::{backend::BackendFactory, error::Error};

static REGISTRY: LazyLock<Mutex<HashMap<String, Arc<dyn BackendFactory>>>> = LazyLock::new(|| {
    #[allow(unused_mut)]
    let mut factories: HashMap<String, Arc<dyn BackendFactory>> = HashMap::new();
    #[cfg(feature = "sqlite3")]
    factories.insert(
        "sqlite3".to_string(),
        Arc::new(crate::sqlite3::Sqlite3Factory),
    );
    Mutex::new(factories)
});

/// Registers `factory` under `name`, replacing any previous registration.
/// Backends compiled into this crate are registered implicitly.
pub fn register_backend(name: &str, factory: Arc<dyn BackendFactory>) {
    REGISTRY
        .lock()
        .expect("backend registry poisoned")
        .insert(name.to_string(), factory);
}

pub(crate) fn find_backend(name: &str) -> Result<Arc<dyn BackendFactory>, Error> {
    REGISTRY
        .lock()
        .expect("backend registry poisoned")
        .get(name)
        .cloned()
        .ok_or_else(|| Error::Connection {
            message: format!("No backend registered under the name '{name}'."),
            code: None,
        })
}
