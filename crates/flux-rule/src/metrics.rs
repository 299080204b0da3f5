use ::metrics::{counter, describe_counter};

/// 描述规则引擎的所有指标
pub fn describe_metrics() {
    describe_counter!("flux_rule_events_total", "Total number of device events evaluated");
    describe_counter!(
        "flux_rule_evaluations_total",
        "Total number of rule condition-set evaluations"
    );
    describe_counter!("flux_rule_triggered_total", "Total number of rules fired");
    describe_counter!(
        "flux_rule_debounced_total",
        "Matched rules suppressed by the re-trigger interval"
    );
    describe_counter!(
        "flux_rule_evaluation_errors_total",
        "Rule evaluation failures by error kind"
    );
    describe_counter!(
        "flux_rule_store_errors_total",
        "Rule store failures by operation"
    );
    describe_counter!(
        "flux_rule_dispatch_requests_total",
        "Action dispatch requests emitted by action type"
    );
    describe_counter!(
        "flux_rule_dispatch_failures_total",
        "Action dispatch requests the executor rejected"
    );
}

pub fn record_event(kind: &'static str) {
    counter!("flux_rule_events_total", 1, "event" => kind);
}

pub fn record_evaluation() {
    counter!("flux_rule_evaluations_total", 1);
}

pub fn record_triggered() {
    counter!("flux_rule_triggered_total", 1);
}

pub fn record_debounced() {
    counter!("flux_rule_debounced_total", 1);
}

pub fn record_evaluation_error(error_kind: &'static str) {
    counter!("flux_rule_evaluation_errors_total", 1, "error_kind" => error_kind);
}

pub fn record_store_error(operation: &'static str) {
    counter!("flux_rule_store_errors_total", 1, "operation" => operation);
}

pub fn record_dispatch(action_type: &'static str) {
    counter!("flux_rule_dispatch_requests_total", 1, "action_type" => action_type);
}

pub fn record_dispatch_failure(action_type: &'static str) {
    counter!("flux_rule_dispatch_failures_total", 1, "action_type" => action_type);
}
