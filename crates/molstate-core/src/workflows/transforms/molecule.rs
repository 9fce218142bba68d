use crate::core::io::bgf;
use crate::core::objects::molecule::{Atom, Model, Structure, Trajectory};
use crate::core::objects::object::StateObject;
use crate::core::params::Params;
use crate::core::transform::definition::{
    TransformError, Transformer, UpdateContext, UpdateOutcome,
};
use phf::{Set, phf_set};
use std::sync::Arc;

static WATER_RESIDUES: Set<&'static str> = phf_set! {
    "HOH", "WAT", "H2O", "TIP", "TIP3", "TIP4", "SOL", "DOD",
};

static POLYMER_RESIDUES: Set<&'static str> = phf_set! {
    "ALA", "ARG", "ASN", "ASP", "CYS", "CYX", "GLN", "GLU", "GLY", "HIS", "HSD", "HSE",
    "HSP", "ILE", "LEU", "LYS", "MET", "PHE", "PRO", "SER", "THR", "TRP", "TYR", "VAL",
    "MSE", "SEC", "PYL",
    "A", "C", "G", "U", "T", "DA", "DC", "DG", "DT", "DU",
};

pub fn is_water_residue(name: &str) -> bool {
    WATER_RESIDUES.contains(name.trim())
}

pub fn is_polymer_residue(name: &str) -> bool {
    POLYMER_RESIDUES.contains(name.trim())
}

/// Every built-in molecular transform recomputes in place when its inputs change.
fn recompute(
    transformer: &impl Transformer,
    ctx: UpdateContext<'_>,
) -> Result<UpdateOutcome, TransformError> {
    Ok(UpdateOutcome::Updated(transformer.apply(ctx.parent, ctx.new_params)?))
}

/// Parses a BGF text object into a trajectory, one model per frame.
pub struct ParseBgf;

impl Transformer for ParseBgf {
    fn apply(&self, parent: &Arc<StateObject>, _params: &Params) -> Result<StateObject, TransformError> {
        let text = parent.as_text().ok_or(TransformError::UnexpectedInput {
            found: parent.kind(),
        })?;
        let document = bgf::parse_str(text).map_err(|e| TransformError::Failed(e.to_string()))?;
        let label = document
            .description
            .clone()
            .unwrap_or_else(|| parent.label().to_string());
        Ok(StateObject::trajectory(label, Trajectory::new(document.frames)))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        recompute(self, ctx)
    }
}

/// Picks frame `index` of a trajectory.
pub struct ModelFromTrajectory;

impl Transformer for ModelFromTrajectory {
    fn apply(&self, parent: &Arc<StateObject>, params: &Params) -> Result<StateObject, TransformError> {
        let trajectory = parent.as_trajectory().ok_or(TransformError::UnexpectedInput {
            found: parent.kind(),
        })?;
        let index = params.get_i64("index").unwrap_or(0);
        let model = usize::try_from(index)
            .ok()
            .and_then(|i| trajectory.frame(i))
            .ok_or_else(|| TransformError::InvalidParam {
                name: "index",
                reason: format!(
                    "frame {index} is out of range ({} frame(s))",
                    trajectory.frame_count()
                ),
            })?;
        Ok(StateObject::model(format!("Model {index}"), Arc::clone(model)))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        recompute(self, ctx)
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        match params.get("index") {
            None => Ok(()),
            Some(value) => match value.as_integer() {
                Some(i) if i >= 0 => Ok(()),
                _ => Err("'index' must be a non-negative integer".into()),
            },
        }
    }
}

/// Wraps a whole model into a structure.
pub struct StructureFromModel;

impl Transformer for StructureFromModel {
    fn apply(&self, parent: &Arc<StateObject>, params: &Params) -> Result<StateObject, TransformError> {
        let model = parent.as_model().ok_or(TransformError::UnexpectedInput {
            found: parent.kind(),
        })?;
        let label = params.get_str("label").unwrap_or("Structure");
        Ok(StateObject::structure(label, Structure::full(Arc::clone(model))))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        recompute(self, ctx)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Polymer,
    Water,
    Ligand,
}

impl Preset {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "polymer" => Some(Preset::Polymer),
            "water" => Some(Preset::Water),
            "ligand" => Some(Preset::Ligand),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Preset::Polymer => "Polymer",
            Preset::Water => "Water",
            Preset::Ligand => "Ligand",
        }
    }

    fn matches(self, residue: &Atom) -> bool {
        match self {
            Preset::Polymer => is_polymer_residue(&residue.res_name),
            Preset::Water => is_water_residue(&residue.res_name),
            Preset::Ligand => residue.hetero && !is_water_residue(&residue.res_name),
        }
    }
}

/// Which residues of a structure a component keeps.
#[derive(Debug, Clone, PartialEq)]
enum Selector {
    Preset(Preset),
    Chain(char),
    Residues {
        chain: Option<char>,
        first: isize,
        last: isize,
    },
}

impl Selector {
    fn from_params(params: &Params) -> Result<Self, String> {
        let chain = match params.get_str("chain") {
            Some(s) => {
                let mut chars = s.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(c),
                    _ => return Err("'chain' must be a single character".into()),
                }
            }
            None => None,
        };

        if let Some(preset) = params.get("preset") {
            let name = preset.as_str().unwrap_or_default();
            return Preset::parse(name)
                .map(Selector::Preset)
                .ok_or_else(|| format!("unknown preset '{name}'"));
        }
        if let Some(range) = params.get_array("residues") {
            let bounds: Vec<i64> = range.iter().filter_map(|v| v.as_integer()).collect();
            return match bounds.as_slice() {
                [first, last] if first <= last && bounds.len() == range.len() => {
                    Ok(Selector::Residues {
                        chain,
                        first: *first as isize,
                        last: *last as isize,
                    })
                }
                _ => Err("'residues' must be [first, last] with first <= last".into()),
            };
        }
        chain
            .map(Selector::Chain)
            .ok_or_else(|| "one of 'preset', 'chain' or 'residues' is required".into())
    }

    fn label(&self) -> String {
        match self {
            Selector::Preset(preset) => preset.label().to_string(),
            Selector::Chain(c) => format!("Chain {c}"),
            Selector::Residues {
                chain: Some(c),
                first,
                last,
            } => format!("Residues {c}:{first}-{last}"),
            Selector::Residues {
                chain: None,
                first,
                last,
            } => format!("Residues {first}-{last}"),
        }
    }

    fn matches(&self, residue: &Atom) -> bool {
        match self {
            Selector::Preset(preset) => preset.matches(residue),
            Selector::Chain(c) => residue.chain_id == *c,
            Selector::Residues { chain, first, last } => {
                chain.is_none_or(|c| residue.chain_id == c)
                    && (*first..=*last).contains(&residue.res_seq)
            }
        }
    }

    /// Keeps whole residues of `structure` whose identity matches.
    fn select(&self, structure: &Structure) -> Vec<usize> {
        let model: &Model = structure.model();
        model
            .residues()
            .project(structure.atom_indices())
            .into_iter()
            .filter(|slice| {
                model
                    .residue_head(slice.segment)
                    .is_some_and(|head| self.matches(head))
            })
            .flat_map(|slice| slice.values.iter().copied())
            .collect()
    }
}

/// Restricts a structure to a component: a preset (`polymer`, `water`, `ligand`), a
/// `chain`, or an inclusive `residues` range optionally limited to one chain.
pub struct StructureComponent;

impl Transformer for StructureComponent {
    fn apply(&self, parent: &Arc<StateObject>, params: &Params) -> Result<StateObject, TransformError> {
        let structure = parent.as_structure().ok_or(TransformError::UnexpectedInput {
            found: parent.kind(),
        })?;
        let selector = Selector::from_params(params).map_err(|reason| TransformError::InvalidParam {
            name: "selector",
            reason,
        })?;
        let atoms = selector.select(structure);
        let label = params
            .get_str("label")
            .map(str::to_string)
            .unwrap_or_else(|| selector.label());
        Ok(StateObject::component(
            label,
            Structure::subset(Arc::clone(structure.model()), atoms),
        ))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        recompute(self, ctx)
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        Selector::from_params(params).map(|_| ())
    }
}
