//! Distribution parameters and configuration loaded from files and environment

use std::collections::HashMap;
use std::fs;

use tracealloc_core::{NopAllocator, TraceAllocConfig};
use tracealloc_sim::{
    DistributionFamily, ParameterSet, SampleParameters, SimulationError, WorkloadSimulation,
};

#[test]
fn test_parameters_survive_json_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("params.json");

    let parameters = SampleParameters::reference_workload();
    fs::write(&path, serde_json::to_string_pretty(&parameters).unwrap()).unwrap();

    let loaded: SampleParameters =
        serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(loaded, parameters);
    assert_eq!(loaded.size.family, DistributionFamily::InverseGaussian);
}

#[test]
fn test_handwritten_parameter_file() {
    let json = r#"{
        "size": {"family": "uniform", "params": [16.0, 48.0]},
        "interval": {"family": "exponential", "params": [0.0, 100.0]},
        "duration": {"family": "constant", "params": [1000.0]}
    }"#;

    let parameters: SampleParameters = serde_json::from_str(json).unwrap();
    assert_eq!(parameters.duration, ParameterSet::constant(1000.0));

    let mut lookup = HashMap::new();
    lookup.insert("TRACEALLOC_EVENT_COUNT", "200");
    lookup.insert("TRACEALLOC_SEED", "5");
    let config = TraceAllocConfig::from_lookup(|key| lookup.get(key).map(|v| v.to_string()));

    let mut sim = WorkloadSimulation::new(config.simulation, &parameters).unwrap();
    assert_eq!(sim.seed(), 5);

    let requests = sim.requests().to_vec();
    assert_eq!(requests.len(), 200);
    assert!(requests.iter().all(|r| (16..=64).contains(&r.size)));
    assert!(requests.iter().all(|r| r.lifetime() == 1000));

    let report = sim.run(&mut NopAllocator::new()).unwrap();
    assert_eq!(report.events_dispatched, 400);
    assert_eq!(report.periodic_reports, 10);
}

#[test]
fn test_wrong_arity_in_file_fails_fast() {
    let json = r#"{
        "size": {"family": "normal", "params": [16.0]},
        "interval": {"family": "constant", "params": [1.0]},
        "duration": {"family": "constant", "params": [1.0]}
    }"#;

    let parameters: SampleParameters = serde_json::from_str(json).unwrap();
    let config = TraceAllocConfig::default();

    assert!(matches!(
        WorkloadSimulation::new(config.simulation, &parameters),
        Err(SimulationError::InvalidParameters { .. })
    ));
}
