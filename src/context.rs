//! Per-request store of database bindings.
//!
//! [`ScopeStore`] lives in the request's [`Extensions`] and maps a
//! namespace to the [`Binding`] created for that request. The key is the
//! same namespace string the owning [`SharedHandle`](crate::pool::SharedHandle)
//! carries, so two handles scoped to different databases can bind side by
//! side on one request.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use http::Extensions;

use crate::pool::Binding;

#[derive(Clone, Default)]
pub struct ScopeStore {
    bindings: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl ScopeStore {
    /// Bind into the request's store, creating the store on first use.
    pub fn bind_into<D>(extensions: &mut Extensions, binding: Arc<Binding<D>>)
    where
        D: Send + Sync + 'static,
    {
        if let Some(store) = extensions.get_mut::<Self>() {
            store.bind(binding);
        } else {
            let mut store = Self::default();
            store.bind(binding);
            extensions.insert(store);
        }
    }

    pub fn bind<D>(&mut self, binding: Arc<Binding<D>>)
    where
        D: Send + Sync + 'static,
    {
        let namespace = binding.namespace().to_owned();
        self.bindings.insert(namespace, binding);
    }

    #[must_use]
    pub fn lookup<D>(&self, namespace: &str) -> Option<Arc<Binding<D>>>
    where
        D: Send + Sync + 'static,
    {
        let entry = Arc::clone(self.bindings.get(namespace)?);
        entry.downcast::<Binding<D>>().ok()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl std::fmt::Debug for ScopeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeStore")
            .field("namespaces", &self.bindings.keys().collect::<Vec<_>>())
            .finish()
    }
}
