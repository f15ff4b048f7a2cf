//! Shared test utilities for `sewernet-core`.

use sewernet_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

use crate::pipe::{Coordinate, PipeAttributes, PipeId, PipeRecord};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `SEWERNET_PBT_CASES` and
/// `SEWERNET_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// A pipe from `start` to `end` whose length is the endpoint distance and
/// whose ground falls by one percent along it.
#[must_use]
pub(crate) fn pipe_between(raw: u32, start: (f64, f64), end: (f64, f64)) -> PipeRecord {
    let start = Coordinate::new(start.0, start.1);
    let end = Coordinate::new(end.0, end.1);
    let length = start.distance(end);
    let attributes = PipeAttributes {
        length,
        initial_elevation: 10.0,
        final_elevation: 10.0 - 0.01 * length,
        ..PipeAttributes::default()
    };
    PipeRecord::new(
        PipeId::new(raw).expect("test ids are non-zero"),
        start,
        end,
        attributes,
    )
}

/// `len` pipes of 100 m along the x axis, pipe `i` draining into `i + 1`.
///
/// Pipe `len` is the outlet. Ground falls one metre per pipe and every pipe
/// drains one hectare.
#[must_use]
pub(crate) fn linear_chain(len: u32) -> Vec<PipeRecord> {
    (1..=len)
        .map(|raw| {
            let offset = f64::from(raw - 1);
            let attributes = PipeAttributes {
                length: 100.0,
                initial_elevation: 100.0 - offset,
                final_elevation: 99.0 - offset,
                drain_area: 1.0,
                ..PipeAttributes::default()
            };
            PipeRecord::new(
                PipeId::new(raw).expect("test ids are non-zero"),
                Coordinate::new(offset * 100.0, 0.0),
                Coordinate::new((offset + 1.0) * 100.0, 0.0),
                attributes,
            )
        })
        .collect()
}
