//! Network fixtures shared by the integration suites.

use sewernet_core::{Coordinate, PipeAttributes, PipeId, PipeRecord};

#[must_use]
pub fn id(raw: u32) -> PipeId {
    PipeId::new(raw).expect("fixture ids are non-zero")
}

/// A pipe from `start` to `end` with ground falling one percent along it.
#[must_use]
pub fn pipe(raw: u32, start: (f64, f64), end: (f64, f64)) -> PipeRecord {
    let start = Coordinate::new(start.0, start.1);
    let end = Coordinate::new(end.0, end.1);
    let length = start.distance(end);
    PipeRecord::new(
        id(raw),
        start,
        end,
        PipeAttributes {
            length,
            initial_elevation: 50.0,
            final_elevation: 50.0 - 0.01 * length,
            ..PipeAttributes::default()
        },
    )
}

/// Pipes 1 → 2 → 3 along the x axis; pipe 3 is the outlet and every pipe
/// drains one hectare.
#[must_use]
pub fn three_pipe_line() -> Vec<PipeRecord> {
    (1..=3_u32)
        .map(|raw| {
            let offset = f64::from(raw - 1);
            let mut record = pipe(raw, (offset * 100.0, 0.0), ((offset + 1.0) * 100.0, 0.0));
            record.attributes.initial_elevation = 50.0 - offset;
            record.attributes.final_elevation = 49.0 - offset;
            record.attributes.drain_area = 1.0;
            record
        })
        .collect()
}
