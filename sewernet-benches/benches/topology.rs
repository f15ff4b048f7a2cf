//! Topology assembly benchmarks.
//!
//! Compares geometric drain-target reconstruction from the outlet against
//! validating a network whose targets are declared.
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
use sewernet_core::SewerNetBuilder;

const SEED: u64 = 42;
const BRANCHING: usize = 3;
const DEPTHS: &[usize] = &[3, 5, 7];

fn topology_impl(c: &mut Criterion) -> Result<(), BenchSetupError> {
    let mut group = c.benchmark_group("topology");
    group.sample_size(20);

    for &depth in DEPTHS {
        let network = SyntheticNetwork::generate(&SyntheticNetworkConfig {
            depth,
            branching: BRANCHING,
            seed: SEED,
        })?;
        let params = NetworkBenchParams {
            depth,
            branching: BRANCHING,
            pipes: network.len(),
        };
        let geometric = SewerNetBuilder::new().with_outlet(network.outlet()).build()?;
        let declared = SewerNetBuilder::new().build()?;

        group.bench_with_input(
            BenchmarkId::new("geometric", params),
            &network,
            |b, network| {
                b.iter(|| geometric.assemble(network.undeclared()));
            },
        );
        group.bench_with_input(
            BenchmarkId::new("declared", params),
            &network,
            |b, network| {
                b.iter(|| declared.assemble(network.declared()));
            },
        );
    }

    group.finish();
    Ok(())
}

fn topology(c: &mut Criterion) {
    if let Err(err) = topology_impl(c) {
        panic!("topology benchmark setup failed: {err}");
    }
}

criterion_group!(benches, topology);
criterion_main!(benches);
