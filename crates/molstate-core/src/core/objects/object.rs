use super::molecule::{Model, Structure, Trajectory};
use crate::core::params::Params;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Broad family an object kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeClass {
    Root,
    Data,
    Object,
    Molecule,
}

/// Runtime type tag of a state object. Transform definitions declare their accepted input
/// and produced output kinds in terms of this closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectKind {
    Root,
    Data,
    Record,
    Trajectory,
    Model,
    Structure,
    Component,
}

impl ObjectKind {
    pub fn type_class(self) -> TypeClass {
        match self {
            ObjectKind::Root => TypeClass::Root,
            ObjectKind::Data => TypeClass::Data,
            ObjectKind::Record => TypeClass::Object,
            ObjectKind::Trajectory
            | ObjectKind::Model
            | ObjectKind::Structure
            | ObjectKind::Component => TypeClass::Molecule,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ObjectKind::Root => "root",
            ObjectKind::Data => "data",
            ObjectKind::Record => "record",
            ObjectKind::Trajectory => "trajectory",
            ObjectKind::Model => "model",
            ObjectKind::Structure => "structure",
            ObjectKind::Component => "component",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Invalid object kind string: '{0}'")]
pub struct ParseObjectKindError(String);

impl FromStr for ObjectKind {
    type Err = ParseObjectKindError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "root" => Ok(ObjectKind::Root),
            "data" => Ok(ObjectKind::Data),
            "record" => Ok(ObjectKind::Record),
            "trajectory" => Ok(ObjectKind::Trajectory),
            "model" => Ok(ObjectKind::Model),
            "structure" => Ok(ObjectKind::Structure),
            "component" => Ok(ObjectKind::Component),
            _ => Err(ParseObjectKindError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ObjectPayload {
    Root,
    Text(String),
    Record(Params),
    Trajectory(Trajectory),
    Model(Arc<Model>),
    Structure(Structure),
}

/// The output of applying a transform to its parent's object.
///
/// Objects are immutable once produced; the runtime shares them behind `Arc`, and a new
/// object on a cell marks its children for recomputation.
#[derive(Debug, Clone, PartialEq)]
pub struct StateObject {
    kind: ObjectKind,
    label: String,
    description: Option<String>,
    payload: ObjectPayload,
}

impl StateObject {
    pub fn root() -> Self {
        Self {
            kind: ObjectKind::Root,
            label: "Root".to_string(),
            description: None,
            payload: ObjectPayload::Root,
        }
    }

    pub fn text(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: ObjectKind::Data,
            label: label.into(),
            description: None,
            payload: ObjectPayload::Text(text.into()),
        }
    }

    pub fn record(label: impl Into<String>, values: Params) -> Self {
        Self {
            kind: ObjectKind::Record,
            label: label.into(),
            description: None,
            payload: ObjectPayload::Record(values),
        }
    }

    pub fn trajectory(label: impl Into<String>, trajectory: Trajectory) -> Self {
        Self {
            kind: ObjectKind::Trajectory,
            label: label.into(),
            description: Some(format!("{} frame(s)", trajectory.frame_count())),
            payload: ObjectPayload::Trajectory(trajectory),
        }
    }

    pub fn model(label: impl Into<String>, model: Arc<Model>) -> Self {
        Self {
            kind: ObjectKind::Model,
            label: label.into(),
            description: Some(format!("{} atom(s)", model.atom_count())),
            payload: ObjectPayload::Model(model),
        }
    }

    pub fn structure(label: impl Into<String>, structure: Structure) -> Self {
        Self::structure_of_kind(ObjectKind::Structure, label, structure)
    }

    pub fn component(label: impl Into<String>, structure: Structure) -> Self {
        Self::structure_of_kind(ObjectKind::Component, label, structure)
    }

    fn structure_of_kind(kind: ObjectKind, label: impl Into<String>, structure: Structure) -> Self {
        Self {
            kind,
            label: label.into(),
            description: Some(format!(
                "{} atom(s) in {} residue(s)",
                structure.atom_count(),
                structure.residue_count()
            )),
            payload: ObjectPayload::Structure(structure),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn type_class(&self) -> TypeClass {
        self.kind.type_class()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn payload(&self) -> &ObjectPayload {
        &self.payload
    }

    pub fn as_text(&self) -> Option<&str> {
        match &self.payload {
            ObjectPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Params> {
        match &self.payload {
            ObjectPayload::Record(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_trajectory(&self) -> Option<&Trajectory> {
        match &self.payload {
            ObjectPayload::Trajectory(trajectory) => Some(trajectory),
            _ => None,
        }
    }

    pub fn as_model(&self) -> Option<&Arc<Model>> {
        match &self.payload {
            ObjectPayload::Model(model) => Some(model),
            _ => None,
        }
    }

    pub fn as_structure(&self) -> Option<&Structure> {
        match &self.payload {
            ObjectPayload::Structure(structure) => Some(structure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::objects::molecule::test_support::small_model;

    #[test]
    fn kinds_map_to_type_classes() {
        assert_eq!(ObjectKind::Root.type_class(), TypeClass::Root);
        assert_eq!(ObjectKind::Data.type_class(), TypeClass::Data);
        assert_eq!(ObjectKind::Record.type_class(), TypeClass::Object);
        assert_eq!(ObjectKind::Component.type_class(), TypeClass::Molecule);
    }

    #[test]
    fn object_kind_parses_case_insensitively_and_displays() {
        assert_eq!("Model".parse::<ObjectKind>().unwrap(), ObjectKind::Model);
        assert_eq!(ObjectKind::Trajectory.to_string(), "trajectory");
        assert!("volume".parse::<ObjectKind>().is_err());
    }

    #[test]
    fn typed_accessors_match_payload_tag() {
        let record = StateObject::record("Square", Params::new().with("a", 10));
        assert_eq!(record.kind(), ObjectKind::Record);
        assert_eq!(record.as_record().and_then(|p| p.get_i64("a")), Some(10));
        assert!(record.as_text().is_none());

        let model = StateObject::model("Model 1", Arc::new(small_model()));
        assert_eq!(model.description(), Some("5 atom(s)"));
        assert!(model.as_model().is_some());
        assert!(model.as_structure().is_none());
    }

    #[test]
    fn component_shares_the_structure_payload() {
        let model = Arc::new(small_model());
        let component = StateObject::component("Water", Structure::subset(model, vec![4]));
        assert_eq!(component.kind(), ObjectKind::Component);
        assert_eq!(component.as_structure().map(Structure::atom_count), Some(1));
        assert_eq!(component.description(), Some("1 atom(s) in 1 residue(s)"));
    }
}
