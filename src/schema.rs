use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

use crate::inference::ActionDecision;

/// Number of features the policy was trained on.
pub const OBS_DIM: usize = 7;

pub const AGENT: &str = "ppo";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Hold,
    Buy,
    Sell,
}

impl Action {
    /// Action-space order of the trained policy head.
    pub const ALL: [Action; 3] = [Action::Hold, Action::Buy, Action::Sell];

    pub fn from_index(idx: usize) -> Option<Action> {
        Self::ALL.get(idx).copied()
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Hold => "HOLD",
            Action::Buy => "BUY",
            Action::Sell => "SELL",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation as sent by the caller. Built only through
/// [`crate::request_validation::validate_decision_payload`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub return_1: f64,
    pub return_5: f64,
    pub ema_spread: f64,
    pub ema_9_slope: f64,
    pub ema_21_slope: f64,
    /// 0 = FLAT, 1 = LONG
    pub position: u8,
    pub unrealized_pnl: f64,
}

impl DecisionRequest {
    /// Positional encoding the policy was trained against. Order is fixed.
    pub fn features(&self) -> FeatureVector {
        FeatureVector([
            self.return_1 as f32,
            self.return_5 as f32,
            self.ema_spread as f32,
            self.ema_9_slope as f32,
            self.ema_21_slope as f32,
            self.position as f32,
            self.unrealized_pnl as f32,
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f32; OBS_DIM]);

impl FeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }
}

impl Deref for FeatureVector {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionProbs {
    #[serde(rename = "HOLD")]
    pub hold: f64,
    #[serde(rename = "BUY")]
    pub buy: f64,
    #[serde(rename = "SELL")]
    pub sell: f64,
}

impl ActionProbs {
    /// Expects a distribution already checked to hold one entry per action.
    pub fn from_distribution(dist: &[f32; 3]) -> Self {
        Self {
            hold: dist[0] as f64,
            buy: dist[1] as f64,
            sell: dist[2] as f64,
        }
    }

    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Hold => self.hold,
            Action::Buy => self.buy,
            Action::Sell => self.sell,
        }
    }

    pub fn sum(&self) -> f64 {
        self.hold + self.buy + self.sell
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionMeta {
    pub model_version: String,
    pub probs: ActionProbs,
    pub action_idx: usize,
    pub latency_ms: f64,
    pub obs: DecisionRequest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResponse {
    pub action: Action,
    pub confidence: f64,
    pub agent: String,
    pub meta: DecisionMeta,
}

impl DecisionResponse {
    pub fn assemble(request: &DecisionRequest, decision: &ActionDecision, model_version: &str) -> Self {
        Self {
            action: decision.action,
            confidence: decision.confidence,
            agent: AGENT.to_string(),
            meta: DecisionMeta {
                model_version: model_version.to_string(),
                probs: decision.probs,
                action_idx: decision.action_idx,
                latency_ms: decision.latency_ms,
                obs: *request,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_request() -> DecisionRequest {
        DecisionRequest {
            return_1: 0.01,
            return_5: -0.02,
            ema_spread: 0.003,
            ema_9_slope: 0.001,
            ema_21_slope: -0.0005,
            position: 1,
            unrealized_pnl: 0.25,
        }
    }

    #[test]
    fn test_feature_order() {
        let features = sample_request().features();
        assert_eq!(features.len(), OBS_DIM);
        assert_eq!(
            features.as_slice(),
            &[0.01, -0.02, 0.003, 0.001, -0.0005, 1.0, 0.25]
        );
    }

    #[test]
    fn test_action_index_table() {
        assert_eq!(Action::from_index(0), Some(Action::Hold));
        assert_eq!(Action::from_index(1), Some(Action::Buy));
        assert_eq!(Action::from_index(2), Some(Action::Sell));
        assert_eq!(Action::from_index(3), None);
        assert_eq!(Action::Sell.index(), 2);
    }

    #[test]
    fn test_action_serializes_uppercase() {
        assert_eq!(serde_json::to_value(Action::Buy).unwrap(), json!("BUY"));
    }

    #[test]
    fn test_assemble_response_shape() {
        let request = sample_request();
        let decision = ActionDecision {
            action: Action::Buy,
            confidence: 0.75,
            probs: ActionProbs::from_distribution(&[0.125, 0.75, 0.125]),
            action_idx: 1,
            latency_ms: 0.42,
        };

        let response = DecisionResponse::assemble(&request, &decision, "ppo_trading_v2");
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["action"], json!("BUY"));
        assert_eq!(value["agent"], json!("ppo"));
        assert_eq!(value["confidence"], json!(0.75));
        assert_eq!(value["meta"]["model_version"], json!("ppo_trading_v2"));
        assert_eq!(value["meta"]["action_idx"], json!(1));
        assert_eq!(value["meta"]["probs"]["HOLD"], json!(0.125));
        assert_eq!(value["meta"]["obs"]["position"], json!(1));
        assert_eq!(value["meta"]["obs"]["unrealized_pnl"], json!(0.25));

        let keys: Vec<&String> = value["meta"]["probs"].as_object().unwrap().keys().collect();
        assert_eq!(keys.len(), 3);
    }
}
