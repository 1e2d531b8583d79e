//! Policy evaluation boundary.
//!
//! The service needs exactly two things from the runtime executing the
//! trained policy: the deterministic (argmax) action and the categorical
//! distribution over actions. [`PolicyEvaluator`] is that surface;
//! [`OnnxPolicy`] implements it on top of ONNX Runtime.

use crate::device::Device;
use crate::error::{InferenceError, ModelLoadError};
use ndarray::Array2;
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};

/// What the policy head output holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyOutput {
    /// Unnormalized categorical logits.
    #[default]
    Logits,
    /// Already normalized action probabilities.
    Probs,
}

impl FromStr for PolicyOutput {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "logits" => Ok(PolicyOutput::Logits),
            "probs" => Ok(PolicyOutput::Probs),
            other => Err(format!("policy_output must be logits or probs (got {:?})", other)),
        }
    }
}

/// Read-only evaluation of a loaded policy.
///
/// Implementations must be pure over the loaded model: the same observation
/// always yields the same index and distribution.
pub trait PolicyEvaluator: Send + Sync {
    /// Index of the most probable action. No sampling.
    fn evaluate_deterministic(&self, obs: &[f32]) -> Result<usize, InferenceError>;

    /// Probability of each discrete action, in action-index order.
    fn evaluate_distribution(&self, obs: &[f32]) -> Result<Vec<f32>, InferenceError>;
}

/// Whether the CUDA execution provider can be used in this process.
pub fn cuda_available() -> bool {
    match CUDAExecutionProvider::default().is_available() {
        Ok(available) => available,
        Err(e) => {
            debug!(error = %e, "CUDA availability probe failed");
            false
        }
    }
}

/// PPO policy exported to ONNX: input `[1, obs_dim]`, output `[1, n_actions]`.
pub struct OnnxPolicy {
    // `Session::run` needs exclusive access.
    session: Mutex<Session>,
    output_name: String,
    output: PolicyOutput,
}

impl OnnxPolicy {
    pub fn load(
        model_path: &Path,
        device: Device,
        output_name: &str,
        output: PolicyOutput,
    ) -> Result<Self, ModelLoadError> {
        if !model_path.is_file() {
            return Err(ModelLoadError::NotFound(model_path.display().to_string()));
        }

        let runtime = |e: ort::Error| ModelLoadError::Runtime(e.to_string());

        let mut builder = Session::builder().map_err(runtime)?;
        if device == Device::Cuda {
            builder = builder
                .with_execution_providers([CUDAExecutionProvider::default()
                    .build()
                    .error_on_failure()])
                .map_err(|e| ModelLoadError::Device(e.to_string()))?;
        }

        let session = builder
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(runtime)?
            .with_intra_threads(1)
            .map_err(runtime)?
            .commit_from_file(model_path)
            .map_err(runtime)?;

        info!(
            path = %model_path.display(),
            device = %device,
            output = %output_name,
            "ONNX policy session created"
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name: output_name.to_string(),
            output,
        })
    }

    /// Run the graph once and return the raw action head for a single observation.
    fn action_head(&self, obs: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let input = Array2::from_shape_vec((1, obs.len()), obs.to_vec())
            .map_err(|e| InferenceError::Runtime(e.to_string()))?;
        let input_tensor = Tensor::from_array(input)?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor])?;
        let head = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            InferenceError::Output(format!("model has no output named {:?}", self.output_name))
        })?;

        let (_, values) = head.try_extract_tensor::<f32>()?;
        Ok(values.to_vec())
    }
}

impl PolicyEvaluator for OnnxPolicy {
    fn evaluate_deterministic(&self, obs: &[f32]) -> Result<usize, InferenceError> {
        // argmax over logits and over probabilities agree
        argmax(&self.action_head(obs)?)
    }

    fn evaluate_distribution(&self, obs: &[f32]) -> Result<Vec<f32>, InferenceError> {
        let head = self.action_head(obs)?;
        match self.output {
            PolicyOutput::Logits => softmax(&head),
            PolicyOutput::Probs => Ok(head),
        }
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Result<usize, InferenceError> {
    if values.is_empty() {
        return Err(InferenceError::Output("empty action head".to_string()));
    }
    if let Some(i) = values.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::Output(format!(
            "non-finite value {} at action {}",
            values[i], i
        )));
    }

    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    Ok(best)
}

/// Numerically stable softmax, accumulated in f64.
pub fn softmax(logits: &[f32]) -> Result<Vec<f32>, InferenceError> {
    let max = logits[argmax(logits)?] as f64;
    let exps: Vec<f64> = logits.iter().map(|&l| (l as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.iter().map(|e| (e / sum) as f32).collect())
}
