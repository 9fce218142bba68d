#![allow(dead_code)]

use molstate::core::objects::object::{ObjectKind, StateObject};
use molstate::core::params::Params;
use molstate::core::transform::definition::{
    TransformDefinition, TransformError, Transformer, UpdateContext, UpdateOutcome,
};
use molstate::core::transform::registry::TransformRegistry;
use molstate::core::tree::node::NodeRef;
use molstate::engine::state::State;
use std::sync::Arc;

/// Record of its own parameters; fails when `fail = true`.
pub struct Passthrough;

impl Transformer for Passthrough {
    fn apply(&self, _: &Arc<StateObject>, params: &Params) -> Result<StateObject, TransformError> {
        if params.get_bool("fail") == Some(true) {
            return Err(TransformError::Failed("asked to fail".into()));
        }
        Ok(StateObject::record("Record", params.clone()))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        Ok(UpdateOutcome::Updated(self.apply(ctx.parent, ctx.new_params)?))
    }
}

/// `{volume: a * a}` of the parent record.
pub struct CalcArea;

impl Transformer for CalcArea {
    fn apply(&self, parent: &Arc<StateObject>, _: &Params) -> Result<StateObject, TransformError> {
        let a = parent
            .as_record()
            .and_then(|r| r.get_f64("a"))
            .ok_or(TransformError::MissingParam("a"))?;
        Ok(StateObject::record("Area", Params::new().with("volume", a * a)))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        Ok(UpdateOutcome::Updated(self.apply(ctx.parent, ctx.new_params)?))
    }
}

/// `square` (root → record), `calc-area` (record → record) and `node` (root or record →
/// record), the last one used to grow arbitrary trees.
pub fn registry() -> Arc<TransformRegistry> {
    let mut registry = TransformRegistry::new();
    registry
        .register(TransformDefinition::new(
            "square",
            &[ObjectKind::Root],
            &[ObjectKind::Record],
            Passthrough,
        ))
        .unwrap();
    registry
        .register(TransformDefinition::new(
            "calc-area",
            &[ObjectKind::Record],
            &[ObjectKind::Record],
            CalcArea,
        ))
        .unwrap();
    registry
        .register(TransformDefinition::new(
            "node",
            &[ObjectKind::Root, ObjectKind::Record],
            &[ObjectKind::Record],
            Passthrough,
        ))
        .unwrap();
    Arc::new(registry)
}

/// Grows a tree of `node` transforms: node `i` (ref `n{i}`) hangs under the node picked by
/// `parents[i] % (i + 1)`, where 0 is the root. Nodes listed in `failing` fail to compute.
pub fn grow(parents: &[usize], failing: &[bool]) -> State {
    grow_into(State::new(registry()), parents, failing)
}

/// [`grow`] on an existing state built over [`registry`], in a single batch.
pub fn grow_into(mut state: State, parents: &[usize], failing: &[bool]) -> State {
    let mut b = state.build();
    let mut refs = vec![NodeRef::root()];
    for (i, pick) in parents.iter().enumerate() {
        let parent = refs[pick % refs.len()].clone();
        let fail = failing.get(i).copied().unwrap_or(false);
        let node_ref = b
            .apply_with_ref(
                &parent,
                "node",
                Params::new().with("i", i as i64).with("fail", fail),
                format!("n{i}"),
            )
            .unwrap();
        refs.push(node_ref);
    }
    state.update(b).unwrap();
    state
}

/// Formats one fixed-column BGF atom record.
pub fn bgf_atom(record: &str, serial: usize, name: &str, res_name: &str, chain: char, res_seq: isize) -> String {
    format!(
        "{:<6} {:>5} {:<5} {:<3} {} {:>5}{:>10.5}{:>10.5}{:>10.5} {:<5}{:>6}{:>8.5}",
        record, serial, name, res_name, chain, res_seq, serial as f64, 0.0, 0.0, "C_3", 0, 0.0
    )
}

/// Two frames of a GLY/ALA dipeptide on chain A with one water on chain W.
pub fn bgf_text() -> String {
    let mut text = String::from("BIOGRF  332\nDESCRP dipeptide in water\n");
    for _ in 0..2 {
        for line in [
            bgf_atom("ATOM", 1, "N", "GLY", 'A', 1),
            bgf_atom("ATOM", 2, "CA", "GLY", 'A', 1),
            bgf_atom("ATOM", 3, "N", "ALA", 'A', 2),
            bgf_atom("ATOM", 4, "CA", "ALA", 'A', 2),
            bgf_atom("HETATM", 5, "O", "HOH", 'W', 1),
        ] {
            text.push_str(&line);
            text.push('\n');
        }
        text.push_str("END\n");
    }
    text
}
