//! Schema cache keyed by Rust type, plus the namespace of visible schemas.
//!
//! Declaring a configuration type means implementing [`ConfigType`]. The
//! declaration runs once per process; every later [`schema_of`] call hands
//! out the same `Arc<Schema>`.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::error::NestfigError;
use crate::schema::Schema;

/// A Rust type with a configuration schema.
///
/// ```
/// use std::sync::Arc;
/// use nestfig::{ConfigType, NestfigError, Schema, schema_of};
///
/// struct Server;
///
/// impl ConfigType for Server {
///     fn declare() -> Result<Arc<Schema>, NestfigError> {
///         Schema::builder("Server").value("host", "localhost").value("port", 8080).build()
///     }
/// }
///
/// let a = schema_of::<Server>()?;
/// let b = schema_of::<Server>()?;
/// assert!(Arc::ptr_eq(&a, &b));
/// # Ok::<(), NestfigError>(())
/// ```
pub trait ConfigType: 'static {
    fn declare() -> Result<Arc<Schema>, NestfigError>;
}

type Cache = RwLock<HashMap<TypeId, Arc<Schema>>>;

fn cache() -> &'static Cache {
    static CACHE: OnceLock<Cache> = OnceLock::new();
    CACHE.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The schema of `T`, declared on first use and cached for the process.
///
/// Declarations run outside the lock so they may themselves call
/// `schema_of` for nested types. If two threads race, the first insert wins
/// and both get that schema. Failed declarations are not cached.
pub fn schema_of<T: ConfigType>() -> Result<Arc<Schema>, NestfigError> {
    let id = TypeId::of::<T>();
    if let Some(schema) = cache().read().get(&id) {
        return Ok(schema.clone());
    }

    let built = T::declare()?;
    debug!(schema = built.name(), "declared configuration schema");
    let mut guard = cache().write();
    Ok(guard.entry(id).or_insert(built).clone())
}

/// Schemas addressable by name when a sub-config has no matching choice key.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    schemas: HashMap<String, Arc<Schema>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, schema: Arc<Schema>) -> Self {
        self.insert(schema);
        self
    }

    pub fn insert(&mut self, schema: Arc<Schema>) {
        self.schemas.insert(schema.name().to_string(), schema);
    }

    pub fn get(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{TrainConfig, adam};
    use crate::schema::Entry;

    #[test]
    fn schema_is_declared_once() {
        let a = schema_of::<TrainConfig>().unwrap();
        let b = schema_of::<TrainConfig>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn nested_declarations_share_cached_schemas() {
        let train = schema_of::<TrainConfig>().unwrap();
        let Some(Entry::Sub(sub)) = train.get("optim") else {
            panic!("optim should be a sub-config");
        };
        let default = sub.default_schema().unwrap();
        assert!(Arc::ptr_eq(default, &adam()));
    }

    #[test]
    fn concurrent_first_use_converges() {
        struct Racy;
        impl ConfigType for Racy {
            fn declare() -> Result<Arc<Schema>, NestfigError> {
                Schema::builder("Racy").value("x", 1).build()
            }
        }

        let handles: Vec<_> = (0..8)
            .map(|_| std::thread::spawn(|| schema_of::<Racy>().unwrap()))
            .collect();
        let schemas: Vec<Arc<Schema>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let cached = schema_of::<Racy>().unwrap();
        assert!(schemas.iter().all(|s| Arc::ptr_eq(s, &cached)));
    }

    #[test]
    fn failed_declarations_are_not_cached() {
        struct Broken;
        impl ConfigType for Broken {
            fn declare() -> Result<Arc<Schema>, NestfigError> {
                Schema::builder("Broken").value("__class__", 1).build()
            }
        }
        assert!(schema_of::<Broken>().is_err());
        assert!(schema_of::<Broken>().is_err());
    }

    #[test]
    fn namespace_lookup_by_schema_name() {
        let ns = Namespace::new().with(adam());
        assert_eq!(ns.len(), 1);
        assert!(ns.get("Adam").is_some());
        assert!(ns.get("adam").is_none());
    }
}
