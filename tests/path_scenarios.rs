use approx::assert_relative_eq;

use mps_driver::config::{NewtonSettings, PathOptions};
use mps_driver::domain::StepRecord;
use mps_driver::error::{DriverError, MaterialError};
use mps_driver::material::{LinearElastic, Material, MaterialInput, MaterialResponse, TangentSource};
use mps_driver::output::{MemorySink, OutputSink};
use mps_driver::solver::{DriverPhase, PathDriver};

const K: f64 = 10.0;
const G: f64 = 6.0;

fn elastic() -> Box<dyn Material> {
    Box::new(LinearElastic::new(K, G).unwrap())
}

fn driver(text: &str, material: Box<dyn Material>) -> PathDriver {
    PathDriver::from_text(text, &PathOptions::default(), material, NewtonSettings::default()).unwrap()
}

/// Elastic, but rejects any sub-step at or above `max_dt`.
struct StiffUntilSmall {
    inner: LinearElastic,
    max_dt: f64,
}

impl Material for StiffUntilSmall {
    fn name(&self) -> &str {
        "stiff-until-small"
    }

    fn tangent_source(&self) -> TangentSource {
        TangentSource::Analytic
    }

    fn update(&self, input: &MaterialInput<'_>) -> Result<MaterialResponse, MaterialError> {
        if input.dtime >= self.max_dt {
            return Err(MaterialError::inadmissible(format!("dt {} too large", input.dtime)));
        }
        self.inner.update(input)
    }
}

/// Fails every write after the first `ok` ones.
struct BrokenSink {
    ok: usize,
    written: usize,
}

impl OutputSink for BrokenSink {
    fn write(&mut self, _record: &StepRecord) -> Result<(), DriverError> {
        if self.written >= self.ok {
            return Err(DriverError::Io("disk full".to_string()));
        }
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

#[test]
fn scenario_a_uniaxial_strain() {
    let mut d = driver("1 10 222222 0.01 0 0 0 0 0", elastic());
    let mut sink = MemorySink::new(d.layout());
    let summary = d.run(&mut sink).unwrap();

    assert_relative_eq!(summary.final_stress[0], (K + 4.0 * G / 3.0) * 0.01, max_relative = 1e-10);
    assert_relative_eq!(summary.final_stress[1], (K - 2.0 * G / 3.0) * 0.01, max_relative = 1e-10);
    assert_relative_eq!(summary.final_stress[2], (K - 2.0 * G / 3.0) * 0.01, max_relative = 1e-10);
    assert_eq!(summary.steps, 10);
    assert_eq!(sink.records().len(), 11);
}

#[test]
fn scenario_b_mixed_stress_strain() {
    let sigma = 0.36;
    let mut d = driver("1 4 422222 0.36 0 0 0 0 0", elastic());
    let mut sink = MemorySink::new(d.layout());
    let summary = d.run(&mut sink).unwrap();

    assert_relative_eq!(summary.final_strain[0], sigma / (K + 4.0 * G / 3.0), max_relative = 1e-8);
    for j in 1..6 {
        assert_eq!(summary.final_strain[j], 0.0);
    }
    assert_relative_eq!(summary.final_stress[0], sigma, max_relative = 1e-8);
}

#[test]
fn scenario_c_inverted_defgrad_never_integrates() {
    let err = PathDriver::from_text(
        "1 1 555555555 -1 0 0 0 1 0 0 0 1",
        &PathOptions::default(),
        elastic(),
        NewtonSettings::default(),
    )
    .err()
    .unwrap();
    let DriverError::InputValidation(errors) = err else {
        panic!("expected input validation error");
    };
    assert_eq!(errors[0].leg, 1);
    assert!(errors[0].message.contains("Jacobian"));
}

#[test]
fn strain_only_steps_evaluate_once() {
    let mut d = driver("1 5 222222 0.01 0.002 0 0.001 0 0", elastic());
    let mut sink = MemorySink::new(d.layout());
    let summary = d.run(&mut sink).unwrap();

    assert_eq!(summary.outcome.evaluations, 5);
    assert_eq!(summary.outcome.iterations, 0);
}

#[test]
fn stress_control_on_elastic_takes_one_iteration_per_step() {
    let mut d = driver("1 3 444444 1 -2 0.5 0.1 0 0", elastic());
    let mut sink = MemorySink::new(d.layout());
    let summary = d.run(&mut sink).unwrap();

    assert_eq!(summary.outcome.iterations, 3);
    let iters = sink.history().column("NEWTON_ITERS").unwrap();
    assert_eq!(iters, vec![0.0, 1.0, 1.0, 1.0]);
}

#[test]
fn finite_difference_tangent_gives_the_same_answer() {
    let fd = Box::new(LinearElastic::new(K, G).unwrap().with_tangent(TangentSource::FiniteDifference));
    let mut analytic = driver("1 2 422222 0.36 0 0 0 0 0", elastic());
    let mut numeric = driver("1 2 422222 0.36 0 0 0 0 0", fd);
    let mut a_sink = MemorySink::new(analytic.layout());
    let mut n_sink = MemorySink::new(numeric.layout());
    let a = analytic.run(&mut a_sink).unwrap();
    let n = numeric.run(&mut n_sink).unwrap();
    assert_relative_eq!(a.final_strain[0], n.final_strain[0], max_relative = 1e-6);
}

#[test]
fn replay_is_deterministic() {
    let text = "0 0 222222 0 0 0 0 0 0\n1 10 422222 1 0.002 0 0 0 0\n2 10 444444 0 0 0 0 0 0";
    let mut d = driver(text, elastic());
    let mut first = MemorySink::new(d.layout());
    let mut second = MemorySink::new(d.layout());
    d.run(&mut first).unwrap();
    d.run(&mut second).unwrap();
    assert_eq!(first.records(), second.records());
}

#[test]
fn committed_times_strictly_increase() {
    let text = "1 7 222222 0.01 0 0 0 0 0\n1.5 3 111111 0 0.01 0 0 0 0\n4 9 422222 0 0 0 0 0 0";
    let mut d = driver(text, elastic());
    let mut sink = MemorySink::new(d.layout());
    d.run(&mut sink).unwrap();

    let times: Vec<f64> = sink.records().iter().map(|r| r.time).collect();
    assert_eq!(times.len(), 20);
    assert!(times.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(times.last().copied(), Some(4.0));
}

#[test]
fn cutback_recovers_within_log2_bisections() {
    let stub = StiffUntilSmall {
        inner: LinearElastic::new(K, G).unwrap(),
        max_dt: 0.3,
    };
    let mut d = driver("1 1 222222 0.01 0 0 0 0 0", Box::new(stub));
    let mut sink = MemorySink::new(d.layout());
    let summary = d.run(&mut sink).unwrap();

    // ceil(log2(1 / 0.3)) = 2
    assert_eq!(summary.outcome.cutback_depth, 2);
    assert_eq!(summary.final_time, 1.0);
    assert_relative_eq!(summary.final_strain[0], 0.01, max_relative = 1e-12);
    assert_relative_eq!(summary.final_stress[0], (K + 4.0 * G / 3.0) * 0.01, max_relative = 1e-10);
    assert_eq!(sink.records().len(), 2);
}

#[test]
fn exhausted_cutbacks_fail_the_path() {
    let stub = StiffUntilSmall {
        inner: LinearElastic::new(K, G).unwrap(),
        max_dt: 0.01,
    };
    let settings = NewtonSettings {
        max_cutbacks: 3,
        ..NewtonSettings::default()
    };
    let mut d = PathDriver::from_text("1 1 222222 0.01 0 0 0 0 0", &PathOptions::default(), Box::new(stub), settings).unwrap();
    let mut sink = MemorySink::new(d.layout());
    let err = d.run(&mut sink).unwrap_err();

    assert_eq!(d.phase(), DriverPhase::Failed);
    match err {
        DriverError::IntegrationFailure { leg, step, cutbacks, source } => {
            assert_eq!((leg, step, cutbacks), (1, 1, 3));
            assert!(matches!(*source, DriverError::Material(MaterialError::Inadmissible(_))));
        }
        other => panic!("unexpected error {other}"),
    }
}

#[test]
fn write_failure_aborts_immediately() {
    let mut d = driver("1 10 222222 0.01 0 0 0 0 0", elastic());
    let mut sink = BrokenSink { ok: 3, written: 0 };
    let err = d.run(&mut sink).unwrap_err();

    assert!(matches!(err, DriverError::Io(_)));
    assert_eq!(sink.written, 3);
    assert_eq!(d.phase(), DriverPhase::Failed);
    assert_relative_eq!(d.state().time, 0.3, max_relative = 1e-12);
}
