use std::sync::Arc;

use devgate::calculate_optimal_simulator_count;
use devgate::AdmissionConfig;
use devgate::AdmissionController;
use devgate::HardwareProfiler;
use devgate::ResourceSampler;
use futures::future::join_all;

use crate::common::enable_logger;

#[test]
fn test_live_host_profile_drives_capacity() {
    enable_logger();
    let profile = HardwareProfiler::system().profile();

    let controller = AdmissionController::new(profile.clone(), AdmissionConfig::default());

    assert!(profile.cpu_cores >= 1);
    assert!(profile.total_memory_bytes > 0);
    assert_eq!(
        controller.capacity(),
        calculate_optimal_simulator_count(profile.total_memory_gib(), profile.cpu_cores)
    );
    assert!((1..=12).contains(&controller.capacity()));
}

#[test]
fn test_live_sampler_snapshots_stay_in_range() {
    let mut sampler = ResourceSampler::system();

    for _ in 0..3 {
        let snapshot = sampler.snapshot();
        assert!((0.0..=1.0).contains(&snapshot.cpu_utilization));
    }
}

#[tokio::test]
async fn test_batch_of_operations_runs_within_capacity() {
    enable_logger();
    let config = AdmissionConfig {
        dynamic_admission: false,
        hard_cap: 2,
        ..Default::default()
    };
    let controller = Arc::new(AdmissionController::system(config));

    let runs = (0..8).map(|i| {
        let controller = controller.clone();
        async move { controller.execute(|| async move { i * 2 }).await }
    });
    let outputs: Vec<u32> = join_all(runs).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(outputs, (0..8).map(|i| i * 2).collect::<Vec<u32>>());
    let stats = controller.stats();
    assert_eq!(stats.admitted, 8);
    assert!(stats.peak_in_flight <= 2);
    assert_eq!(controller.in_flight(), 0);
}
