use std::collections::BTreeMap;
use std::sync::Arc;

use crate::Provider;
use crate::error::{ErrorKind, Result};

/// Providers keyed by lowercase name.
#[derive(Clone, Default)]
pub struct Registry {
    providers: BTreeMap<String, Arc<dyn Provider>>,
}
impl Registry {
    pub fn register(&mut self, provider: impl Provider + 'static) -> Result<()> {
        let name = normalize(provider.name());
        if name.is_empty() || self.providers.contains_key(&name) {
            exn::bail!(ErrorKind::Registration(name));
        }
        self.providers.insert(name, Arc::new(provider));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(&normalize(name)).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}
impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

pub(crate) fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::javbus::Javbus;
    use crate::javdb::Javdb;

    #[test]
    fn test_register_and_get() {
        let registry = crate::builtin("").unwrap();
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["javbus", "javdb"]);
        assert_eq!(registry.get(" JavBus ").unwrap().name(), "javbus");
        assert!(registry.get("r18").is_none());
    }

    #[test]
    fn test_duplicate_is_rejected() {
        let mut registry = Registry::default();
        registry.register(Javbus::default()).unwrap();
        registry.register(Javdb::default()).unwrap();
        let err = registry.register(Javbus::default()).unwrap_err();
        assert_eq!(*err, ErrorKind::Registration("javbus".to_string()));
    }
}
