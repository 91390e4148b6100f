//! Process-wide processor registry: an explicit `name -> constructor` map
//! populated once at startup from a statically imported list, not a
//! filesystem scan. Read-only after construction.

use crate::processor::Processor;
use std::collections::HashMap;
use std::sync::Arc;

pub type ProcessorConstructor = fn() -> Arc<dyn Processor>;

#[derive(Default)]
pub struct Registry {
    constructors: HashMap<&'static str, ProcessorConstructor>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from a static list, e.g. `uw_processors::ALL_PROCESSORS`.
    /// Duplicate names overwrite the earlier entry; a warning is logged.
    pub fn from_constructors(entries: &[(&'static str, ProcessorConstructor)]) -> Self {
        let mut registry = Self::new();
        for (name, ctor) in entries {
            if registry.constructors.contains_key(name) {
                tracing::warn!(processor = name, "duplicate processor registration, overwriting");
            }
            registry.constructors.insert(name, *ctor);
        }
        registry
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Instantiates a fresh processor instance by name. `None` means the
    /// caller should abort the workflow for that processor with a logged
    /// error rather than silently skip it.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Processor>> {
        self.constructors.get(name).map(|ctor| ctor())
    }

    pub fn registered_names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessorKind;
    use crate::error::Result;
    use crate::payload::Triggers;
    use async_trait::async_trait;
    use crate::processor::ExecutionContext;
    use serde_json::Value;

    struct Dummy;

    #[async_trait]
    impl Processor for Dummy {
        fn name(&self) -> &'static str {
            "dummy"
        }
        fn kind(&self) -> ProcessorKind {
            ProcessorKind::Application
        }
        fn triggers(&self) -> Triggers {
            Triggers::default()
        }
        async fn transform_input(&self, p: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
            Ok(p.clone())
        }
        async fn validate_input(&self, _t: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
        async fn extract(&self, v: &Value, _ctx: &mut ExecutionContext) -> Result<Value> {
            Ok(v.clone())
        }
        async fn validate_output(&self, _o: &Value, _ctx: &ExecutionContext) -> Result<()> {
            Ok(())
        }
    }

    fn make_dummy() -> Arc<dyn Processor> {
        Arc::new(Dummy)
    }

    #[test]
    fn lookup_by_name_succeeds_and_unknown_name_is_none() {
        let registry = Registry::from_constructors(&[("dummy", make_dummy)]);
        assert!(registry.is_registered("dummy"));
        assert!(registry.get("dummy").is_some());
        assert!(registry.get("nonexistent").is_none());
    }
}
