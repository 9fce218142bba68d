use crate::core::objects::object::StateObject;
use crate::core::params::Params;
use crate::core::transform::definition::{
    TransformError, Transformer, UpdateContext, UpdateOutcome,
};
use std::sync::Arc;

/// Wraps literal text (`text`) into a data object under the root.
pub struct RawData;

impl Transformer for RawData {
    fn apply(&self, _parent: &Arc<StateObject>, params: &Params) -> Result<StateObject, TransformError> {
        let text = params
            .get_str("text")
            .ok_or(TransformError::MissingParam("text"))?;
        let label = params.get_str("label").unwrap_or("Data");
        Ok(StateObject::text(label, text).with_description(format!("{} byte(s)", text.len())))
    }

    fn update(&self, ctx: UpdateContext<'_>) -> Result<UpdateOutcome, TransformError> {
        if ctx.inputs_unchanged() {
            return Ok(UpdateOutcome::Unchanged);
        }
        Ok(UpdateOutcome::Updated(self.apply(ctx.parent, ctx.new_params)?))
    }

    fn validate(&self, params: &Params) -> Result<(), String> {
        match params.get("text") {
            Some(value) if value.is_str() => Ok(()),
            Some(_) => Err("'text' must be a string".into()),
            None => Err("'text' is required".into()),
        }
    }
}
