use super::*;

#[test]
fn test_gather_metrics_uses_devgate_prefix() {
    ADMISSION_DECISIONS.with_label_values(&["admitted"]).inc();
    CHANGE_EVENTS.with_label_values(&["source_code", "medium"]).inc();

    let body = gather_metrics();

    assert!(body.contains("devgate_admission_decisions"), "body: {body}");
    assert!(body.contains("devgate_change_events"), "body: {body}");
    assert!(body.contains("devgate_admission_capacity"));
}

#[test]
fn test_labelled_counters_are_independent() {
    let before_admitted = ADMISSION_DECISIONS.with_label_values(&["admitted"]).get();
    let before_rejected = ADMISSION_DECISIONS.with_label_values(&["rejected"]).get();

    ADMISSION_DECISIONS.with_label_values(&["rejected"]).inc();

    // other tests may admit concurrently, but never reject less
    assert!(ADMISSION_DECISIONS.with_label_values(&["admitted"]).get() >= before_admitted);
    assert!(ADMISSION_DECISIONS.with_label_values(&["rejected"]).get() > before_rejected);
}
