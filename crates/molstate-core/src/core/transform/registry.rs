use super::definition::{TransformDefinition, TransformKind};
use crate::core::objects::object::ObjectKind;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Transform kind '{0}' is already registered")]
    DuplicateKind(TransformKind),
    #[error("Transform kind '{0}' is not registered")]
    NotFound(TransformKind),
    #[error("The process-wide transform registry has already been installed")]
    AlreadyInstalled,
}

/// Catalog of transform definitions keyed by kind.
///
/// Registration is append-only: there is no way to remove or replace a definition. A
/// registry is filled once at startup and then shared immutably (usually as an `Arc`).
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    definitions: HashMap<TransformKind, Arc<TransformDefinition>>,
    order: Vec<TransformKind>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<TransformRegistry>> = OnceLock::new();

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: TransformDefinition) -> Result<(), RegistryError> {
        let kind = definition.kind().clone();
        if kind.is_root() || self.definitions.contains_key(&kind) {
            return Err(RegistryError::DuplicateKind(kind));
        }
        debug!(kind = %kind, "Registering transform.");
        self.order.push(kind.clone());
        self.definitions.insert(kind, Arc::new(definition));
        Ok(())
    }

    pub fn lookup(&self, kind: &TransformKind) -> Result<&Arc<TransformDefinition>, RegistryError> {
        self.definitions
            .get(kind)
            .ok_or_else(|| RegistryError::NotFound(kind.clone()))
    }

    pub fn contains(&self, kind: &TransformKind) -> bool {
        self.definitions.contains_key(kind)
    }

    /// Kinds whose declared input set includes `input`, in registration order.
    pub fn applicable_to(&self, input: ObjectKind) -> Vec<&TransformKind> {
        self.order
            .iter()
            .filter(|kind| {
                self.definitions
                    .get(*kind)
                    .is_some_and(|def| def.accepts(input))
            })
            .collect()
    }

    /// Declared output kinds of the transform that produces a node of `kind`. The implicit
    /// root produces exactly [`ObjectKind::Root`].
    pub fn output_kinds_of(&self, kind: &TransformKind) -> Result<&[ObjectKind], RegistryError> {
        if kind.is_root() {
            return Ok(&[ObjectKind::Root]);
        }
        Ok(self.lookup(kind)?.output_kinds())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TransformDefinition>> {
        self.order.iter().filter_map(|kind| self.definitions.get(kind))
    }
}

/// Installs the process-wide registry. Succeeds exactly once per process.
pub fn install_global(registry: TransformRegistry) -> Result<Arc<TransformRegistry>, RegistryError> {
    let registry = Arc::new(registry);
    GLOBAL_REGISTRY
        .set(registry.clone())
        .map_err(|_| RegistryError::AlreadyInstalled)?;
    Ok(registry)
}

/// The process-wide registry, if one has been installed.
pub fn global() -> Option<Arc<TransformRegistry>> {
    GLOBAL_REGISTRY.get().cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objects::object::StateObject;
    use crate::core::params::Params;
    use crate::core::transform::definition::{ApplyFn, TransformError};

    fn definition(kind: &str, from: &[ObjectKind], to: &[ObjectKind]) -> TransformDefinition {
        TransformDefinition::new(
            kind,
            from,
            to,
            ApplyFn(
                |_: &Arc<StateObject>, p: &Params| -> Result<StateObject, TransformError> {
                    Ok(StateObject::record("r", p.clone()))
                },
            ),
        )
    }

    #[test]
    fn register_rejects_duplicate_kinds() {
        let mut registry = TransformRegistry::new();
        registry
            .register(definition("a", &[ObjectKind::Root], &[ObjectKind::Record]))
            .unwrap();
        let err = registry
            .register(definition("a", &[ObjectKind::Data], &[ObjectKind::Record]))
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateKind("a".into()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_the_root_kind() {
        let mut registry = TransformRegistry::new();
        let err = registry
            .register(definition("root", &[ObjectKind::Root], &[ObjectKind::Root]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateKind(_)));
    }

    #[test]
    fn lookup_reports_unknown_kinds() {
        let registry = TransformRegistry::new();
        assert_eq!(
            registry.lookup(&"missing".into()).unwrap_err(),
            RegistryError::NotFound("missing".into())
        );
    }

    #[test]
    fn applicable_to_preserves_registration_order() {
        let mut registry = TransformRegistry::new();
        registry
            .register(definition("z", &[ObjectKind::Root], &[ObjectKind::Data]))
            .unwrap();
        registry
            .register(definition("m", &[ObjectKind::Model], &[ObjectKind::Structure]))
            .unwrap();
        registry
            .register(definition("a", &[ObjectKind::Root, ObjectKind::Model], &[ObjectKind::Record]))
            .unwrap();

        let kinds: Vec<&str> = registry
            .applicable_to(ObjectKind::Root)
            .into_iter()
            .map(TransformKind::as_str)
            .collect();
        assert_eq!(kinds, vec!["z", "a"]);
        assert_eq!(registry.applicable_to(ObjectKind::Component).len(), 0);
    }

    #[test]
    fn output_kinds_of_root_is_root() {
        let registry = TransformRegistry::new();
        assert_eq!(
            registry.output_kinds_of(&TransformKind::root()).unwrap(),
            &[ObjectKind::Root]
        );
    }

    #[test]
    fn global_registry_installs_once() {
        // Another test in the same process may have installed it first.
        let _ = install_global(TransformRegistry::new());
        let second = install_global(TransformRegistry::new());
        assert_eq!(second.unwrap_err(), RegistryError::AlreadyInstalled);
        assert!(global().is_some());
    }
}
