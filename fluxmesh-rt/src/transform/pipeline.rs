//! Compilation and application of an ordered transform list.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use serde_json::Value;

// Layer 3: Internal module imports
use super::append::AppendTransform;
use super::copy::CopyTransform;
use super::error::TransformError;
use super::filter::FilterTransform;
use super::map::MapTransform;
use super::reduce::ReduceTransform;
use super::traits::TransformStep;
use crate::expression::Evaluator;
use crate::message::Message;
use crate::util::ComponentIdentity;

/// An ordered, pre-compiled `input_transforms` list.
///
/// # Example
///
/// ```rust
/// use fluxmesh_rt::expression::Evaluator;
/// use fluxmesh_rt::message::Message;
/// use fluxmesh_rt::transform::TransformPipeline;
/// use serde_json::json;
///
/// let pipeline = TransformPipeline::from_config(&[json!({
///     "type": "copy",
///     "source_expression": "input.payload",
///     "dest_expression": "user_data.temp:payload",
/// })]).unwrap();
///
/// let mut message = Message::new(json!({"text": "Hello, World!"}));
/// pipeline.apply(&Evaluator::new(), &mut message, None).unwrap();
/// ```
pub struct TransformPipeline {
    steps: Vec<Box<dyn TransformStep>>,
}

impl TransformPipeline {
    /// An empty pipeline.
    pub fn empty() -> Self {
        Self { steps: Vec::new() }
    }

    /// Compile an `input_transforms` list.
    ///
    /// # Errors
    ///
    /// Fails when a transform has no `type`, an unknown type, or is missing
    /// required fields; the error carries the index of the offending entry.
    pub fn from_config(transforms: &[Value]) -> Result<Self, TransformError> {
        let mut steps: Vec<Box<dyn TransformStep>> = Vec::with_capacity(transforms.len());
        for (index, config) in transforms.iter().enumerate() {
            let type_name = config
                .get("type")
                .and_then(Value::as_str)
                .ok_or(TransformError::MissingType { index })?;
            let step: Box<dyn TransformStep> = match type_name {
                "copy" => Box::new(CopyTransform::from_config(config, index)?),
                "append" => Box::new(AppendTransform::from_config(config, index)?),
                "map" => Box::new(MapTransform::from_config(config, index)?),
                "reduce" => Box::new(ReduceTransform::from_config(config, index)?),
                "filter" => Box::new(FilterTransform::from_config(config, index)?),
                other => {
                    return Err(TransformError::UnknownType {
                        index,
                        type_name: other.to_string(),
                    })
                }
            };
            steps.push(step);
        }
        Ok(Self { steps })
    }

    /// Apply every transform in declaration order.
    pub fn apply(
        &self,
        evaluator: &Evaluator,
        message: &mut Message,
        identity: Option<&ComponentIdentity>,
    ) -> Result<(), TransformError> {
        for step in &self.steps {
            step.apply(evaluator, message, identity)?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
