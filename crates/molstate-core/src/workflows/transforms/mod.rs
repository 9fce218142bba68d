//! Built-in transforms of the molecular pipeline.
//!
//! The pipeline is `root -> raw-data -> parse-bgf -> model-from-trajectory ->
//! structure-from-model -> structure-component`. Install them into a registry with
//! [`register_builtins`].

pub mod data;
pub mod molecule;

use crate::core::objects::object::ObjectKind;
use crate::core::params::Params;
use crate::core::transform::definition::TransformDefinition;
use crate::core::transform::registry::{RegistryError, TransformRegistry};
use data::RawData;
use molecule::{ModelFromTrajectory, ParseBgf, StructureComponent, StructureFromModel};

pub const RAW_DATA: &str = "raw-data";
pub const PARSE_BGF: &str = "parse-bgf";
pub const MODEL_FROM_TRAJECTORY: &str = "model-from-trajectory";
pub const STRUCTURE_FROM_MODEL: &str = "structure-from-model";
pub const STRUCTURE_COMPONENT: &str = "structure-component";

pub fn builtin_definitions() -> Vec<TransformDefinition> {
    vec![
        TransformDefinition::new(RAW_DATA, &[ObjectKind::Root], &[ObjectKind::Data], RawData)
            .with_display_name("Raw Data"),
        TransformDefinition::new(
            PARSE_BGF,
            &[ObjectKind::Data],
            &[ObjectKind::Trajectory],
            ParseBgf,
        )
        .with_display_name("Parse BGF"),
        TransformDefinition::new(
            MODEL_FROM_TRAJECTORY,
            &[ObjectKind::Trajectory],
            &[ObjectKind::Model],
            ModelFromTrajectory,
        )
        .with_display_name("Model from Trajectory")
        .with_default_params(Params::new().with("index", 0)),
        TransformDefinition::new(
            STRUCTURE_FROM_MODEL,
            &[ObjectKind::Model],
            &[ObjectKind::Structure],
            StructureFromModel,
        )
        .with_display_name("Structure from Model"),
        TransformDefinition::new(
            STRUCTURE_COMPONENT,
            &[ObjectKind::Structure],
            &[ObjectKind::Component],
            StructureComponent,
        )
        .with_display_name("Structure Component"),
    ]
}

pub fn register_builtins(registry: &mut TransformRegistry) -> Result<(), RegistryError> {
    for definition in builtin_definitions() {
        registry.register(definition)?;
    }
    Ok(())
}

/// A fresh registry holding only the built-in transforms.
pub fn builtin_registry() -> Result<TransformRegistry, RegistryError> {
    let mut registry = TransformRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}
