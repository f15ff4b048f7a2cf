//! Design benchmarks over synthetic dendritic networks.
//!
//! Each iteration assembles the network and sizes every pipe against a
//! commercial catalog, so the timing covers the full design run.
#![expect(
    missing_docs,
    reason = "Criterion macros generate items without doc comments"
)]
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use sewernet_benches::{
    error::BenchSetupError,
    network::{SyntheticNetwork, SyntheticNetworkConfig},
    params::NetworkBenchParams,
};
use sewernet_core::{DesignParams, DiameterCatalog, RunContext, SewerNetBuilder, StormCurve};

const SEED: u64 = 42;
const CASES: &[(usize, usize)] = &[(3, 3), (5, 3), (4, 5)];
const CATALOG: &[f64] = &[0.2, 0.25, 0.3, 0.4, 0.5, 0.6, 0.8, 1.0, 1.2, 1.5, 2.0, 2.5];

fn design_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("design");
    group.sample_size(10);

    let engine = SewerNetBuilder::new().build()?;
    let params = DesignParams::builder(StormCurve::new(60.0, 0.35)?)
        .with_catalog(DiameterCatalog::new(CATALOG.to_vec())?)
        .build()?;

    for &(depth, branching) in CASES {
        let network = SyntheticNetwork::generate(&SyntheticNetworkConfig {
            depth,
            branching,
            seed: SEED,
        })?;
        let bench_params = NetworkBenchParams {
            depth,
            branching,
            pipes: network.len(),
        };

        group.bench_with_input(
            BenchmarkId::from_parameter(bench_params),
            &network,
            |b, network| {
                b.iter(|| engine.design(network.declared(), &params, &mut RunContext::default()));
            },
        );
    }

    group.finish();
    Ok(())
}

fn design(c: &mut Criterion) {
    if let Err(err) = design_impl(c) {
        panic!("design benchmark setup failed: {err}");
    }
}

criterion_group!(benches, design);
criterion_main!(benches);
