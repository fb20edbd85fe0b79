//! In-process reference registry
//!
//! Binds data-source reference names to connection factories, standing in
//! for the routing framework's bean registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use vdbgate_core::{ConnectionFactory, GatewayError, GatewayResult, ReferenceResolver};

/// Thread-safe name → connection factory registry
#[derive(Default)]
pub struct BeanRegistry {
    beans: RwLock<HashMap<String, Arc<dyn ConnectionFactory>>>,
}

impl BeanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name`, failing if it is already bound
    pub fn bind(&self, name: &str, factory: Arc<dyn ConnectionFactory>) -> GatewayResult<()> {
        if name.trim().is_empty() {
            return Err(GatewayError::validation("Reference name must not be empty"));
        }
        let mut beans = self.beans.write();
        if beans.contains_key(name) {
            return Err(GatewayError::validation(format!(
                "Reference '{name}' is already bound"
            )));
        }
        beans.insert(name.to_string(), factory);
        Ok(())
    }

    pub fn unbind(&self, name: &str) -> Option<Arc<dyn ConnectionFactory>> {
        self.beans.write().remove(name)
    }

    /// Bound names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.beans.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.beans.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.beans.read().is_empty()
    }
}

impl ReferenceResolver for BeanRegistry {
    fn lookup(&self, name: &str) -> Option<Arc<dyn ConnectionFactory>> {
        self.beans.read().get(name).map(Arc::clone)
    }
}
