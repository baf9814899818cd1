use lazy_static::lazy_static;
use prometheus::Encoder;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use prometheus::TextEncoder;
use tracing::error;

lazy_static! {
    pub static ref ADMISSION_CAPACITY: IntGauge = IntGauge::new(
        "admission_capacity",
        "Operations the admission controller allows at once"
    )
    .expect("metric can not be created");

    pub static ref ADMISSION_IN_FLIGHT: IntGauge = IntGauge::new(
        "admission_in_flight",
        "Operations currently holding an admission slot"
    )
    .expect("metric can not be created");

    pub static ref ADMISSION_DECISIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("admission_decisions", "Admission outcomes"),
        &["outcome"]
    )
    .expect("Should succeed to create metric");

    pub static ref ACTIVE_WATCHES: IntGauge = IntGauge::new(
        "active_watches",
        "Paths with a live watch handle"
    )
    .expect("metric can not be created");

    pub static ref CHANGE_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("change_events", "Classified file change events"),
        &["category", "impact"]
    )
    .expect("Should succeed to create metric");

    pub static ref REGISTRY: Registry = {
        let registry = Registry::new_custom(Some("devgate".to_string()), None)
            .expect("registry can be created");
        register_custom_metrics(&registry);
        registry
    };
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(ADMISSION_CAPACITY.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ADMISSION_IN_FLIGHT.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ADMISSION_DECISIONS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(ACTIVE_WATCHES.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CHANGE_EVENTS.clone()))
        .expect("collector can be registered");
}

/// Renders every metric in the Prometheus text exposition format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
        return String::default();
    }
    match String::from_utf8(buffer) {
        Ok(body) => body,
        Err(e) => {
            error!("metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}

#[cfg(test)]
mod metrics_test;
