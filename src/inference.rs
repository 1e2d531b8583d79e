//! Inference adapter: owns the loaded policy and the device it runs on.

use std::time::Instant;
use tracing::info;

use crate::config::Settings;
use crate::device::Device;
use crate::error::{DecideError, InferenceError, ModelLoadError, ShapeError};
use crate::policy::{cuda_available, OnnxPolicy, PolicyEvaluator};
use crate::schema::{Action, ActionProbs, OBS_DIM};

/// Action-space arity the index-to-label table covers.
pub const NUM_ACTIONS: usize = Action::ALL.len();

/// Tolerance on the distribution sum reported by the policy.
const PROB_SUM_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterState {
    Uninitialized,
    Ready,
}

/// Outcome of one policy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionDecision {
    pub action: Action,
    /// Probability assigned to `action`, not necessarily the maximum.
    pub confidence: f64,
    pub probs: ActionProbs,
    pub action_idx: usize,
    pub latency_ms: f64,
}

pub struct PpoInference {
    policy: Box<dyn PolicyEvaluator>,
    device: Device,
    version: String,
}

impl PpoInference {
    /// Resolve the device, load the ONNX artifact and verify its action space.
    pub fn load(settings: &Settings) -> Result<Self, ModelLoadError> {
        let policy = settings
            .device_policy()
            .map_err(|e| ModelLoadError::Device(e.to_string()))?;
        let output = settings
            .output_kind()
            .map_err(|e| ModelLoadError::Runtime(e.to_string()))?;

        let device = policy.resolve(cuda_available);
        info!(policy = ?policy, device = %device, "Execution device resolved");

        let onnx = OnnxPolicy::load(&settings.model_path, device, &settings.output_name, output)?;
        Self::new(Box::new(onnx), device, settings.model_version.clone())
    }

    /// Wrap an already loaded policy. A probe evaluation checks that the policy
    /// exposes exactly [`NUM_ACTIONS`] actions before the adapter becomes ready.
    pub fn new(
        policy: Box<dyn PolicyEvaluator>,
        device: Device,
        version: impl Into<String>,
    ) -> Result<Self, ModelLoadError> {
        let probe = [0.0f32; OBS_DIM];

        let dist = policy.evaluate_distribution(&probe)?;
        if dist.len() != NUM_ACTIONS {
            return Err(ModelLoadError::ActionSpace {
                expected: NUM_ACTIONS,
                actual: dist.len(),
            });
        }

        let idx = policy.evaluate_deterministic(&probe)?;
        if idx >= NUM_ACTIONS {
            return Err(InferenceError::ActionIndex {
                index: idx,
                size: NUM_ACTIONS,
            }
            .into());
        }

        let version = version.into();
        info!(version = %version, device = %device, "Policy ready");

        Ok(Self {
            policy,
            device,
            version,
        })
    }

    /// Deterministic decision for one feature vector.
    pub fn decide(&self, obs: &[f32]) -> Result<ActionDecision, DecideError> {
        if obs.len() != OBS_DIM {
            return Err(ShapeError {
                expected: OBS_DIM,
                actual: obs.len(),
            }
            .into());
        }

        let start = Instant::now();

        let action_idx = self.policy.evaluate_deterministic(obs)?;
        let action = Action::from_index(action_idx).ok_or(InferenceError::ActionIndex {
            index: action_idx,
            size: NUM_ACTIONS,
        })?;

        let dist = checked_distribution(&self.policy.evaluate_distribution(obs)?)?;
        let probs = ActionProbs::from_distribution(&dist);
        let confidence = probs.get(action);

        let latency_ms = start.elapsed().as_secs_f64() * 1000.0;

        Ok(ActionDecision {
            action,
            confidence,
            probs,
            action_idx,
            latency_ms,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn state(&self) -> AdapterState {
        AdapterState::Ready
    }
}

fn checked_distribution(dist: &[f32]) -> Result<[f32; NUM_ACTIONS], InferenceError> {
    let probs: [f32; NUM_ACTIONS] = dist.try_into().map_err(|_| {
        InferenceError::Distribution(format!(
            "expected {} probabilities, got {}",
            NUM_ACTIONS,
            dist.len()
        ))
    })?;

    if let Some(p) = probs.iter().find(|p| !p.is_finite() || **p < 0.0 || **p > 1.0 + PROB_SUM_TOLERANCE) {
        return Err(InferenceError::Distribution(format!(
            "probability {} outside [0, 1]",
            p
        )));
    }

    let sum: f32 = probs.iter().sum();
    if (sum - 1.0).abs() > PROB_SUM_TOLERANCE {
        return Err(InferenceError::Distribution(format!("sum = {}", sum)));
    }

    Ok(probs)
}
