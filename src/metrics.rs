use once_cell::sync::Lazy;
use prometheus::{
    register_histogram, register_int_counter_vec, register_int_gauge, Histogram, IntCounterVec,
    IntGauge,
};

use crate::schema::Action;

pub static POLICY_LATENCY: Lazy<Histogram> = Lazy::new(|| {
    register_histogram!(
        "ppo_inference_policy_latency_seconds",
        "Policy evaluation latency (deterministic action + distribution)",
        vec![0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1]
    )
    .expect("policy_latency histogram")
});

pub static DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ppo_inference_decisions_total",
        "Decisions served, by action",
        &["action"]
    )
    .expect("decisions counter")
});

pub static REJECTED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "ppo_inference_rejected_requests_total",
        "Decision requests answered with an error, by reason",
        &["reason"]
    )
    .expect("rejected_requests counter")
});

pub static MODEL_READY: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "ppo_inference_model_ready",
        "1 when the policy is loaded and serving, 0 otherwise"
    )
    .expect("model_ready gauge")
});

pub fn record_decision(action: Action, latency_ms: f64) {
    DECISIONS.with_label_values(&[action.as_str()]).inc();
    POLICY_LATENCY.observe(latency_ms / 1000.0);
}

pub fn inc_rejected(reason: &str) {
    REJECTED_REQUESTS.with_label_values(&[reason]).inc();
}

pub fn set_model_ready(ready: bool) {
    MODEL_READY.set(ready as i64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_decision_counts_by_action() {
        let before = DECISIONS.with_label_values(&["SELL"]).get();
        record_decision(Action::Sell, 1.5);
        assert_eq!(DECISIONS.with_label_values(&["SELL"]).get(), before + 1);
    }

    #[test]
    fn test_model_ready_gauge() {
        set_model_ready(true);
        assert_eq!(MODEL_READY.get(), 1);
    }
}
