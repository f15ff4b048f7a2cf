//! Read-only structural checks over a resolved pipe array.
//!
//! The validator never repairs anything. [`NetworkValidator::check_all`]
//! stops at the first violation; [`NetworkValidator::collect_all`] gathers
//! every violation for diagnostics.

use crate::{
    error::TopologyViolation,
    params::ENDPOINT_TOLERANCE,
    pipe::{DrainTarget, PipeRecord},
};

/// Structural invariants of a drainage tree, in evaluation order.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopologyInvariant {
    /// Exactly one pipe drains to the outlet.
    SingleOutlet,
    /// Every pipe has a drain target naming an existing, different pipe.
    References,
    /// No junction point receives more upstream pipes than the junction
    /// limit. The outlet pipe has a junction point at each end.
    JunctionFanIn,
    /// Every pipe reaches the outlet within as many hops as there are pipes.
    Reachability,
}

impl TopologyInvariant {
    /// Returns all invariants in the order they should be evaluated.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [
            Self::SingleOutlet,
            Self::References,
            Self::JunctionFanIn,
            Self::Reachability,
        ]
    }
}

/// Checks a pipe array produced by the topology builder.
///
/// # Examples
/// ```
/// use sewernet_core::{Coordinate, DrainTarget, NetworkValidator, PipeAttributes, PipeId, PipeRecord};
///
/// let outlet = PipeRecord::new(
///     PipeId::new(1)?,
///     Coordinate::new(0.0, 0.0),
///     Coordinate::new(10.0, 0.0),
///     PipeAttributes::default(),
/// )
/// .with_drain_target(DrainTarget::Outlet);
/// let pipes = [outlet];
/// assert!(NetworkValidator::new(&pipes, 6).check_all().is_ok());
/// # Ok::<(), sewernet_core::ConfigError>(())
/// ```
#[derive(Debug)]
pub struct NetworkValidator<'a> {
    pipes: &'a [PipeRecord],
    junction_limit: usize,
}

impl<'a> NetworkValidator<'a> {
    /// Creates a validator for `pipes` with the given junction limit.
    #[must_use]
    pub const fn new(pipes: &'a [PipeRecord], junction_limit: usize) -> Self {
        Self {
            pipes,
            junction_limit,
        }
    }

    /// Runs all invariants, returning the first violation encountered.
    ///
    /// # Errors
    /// Returns the first [`TopologyViolation`] found.
    pub fn check_all(&self) -> Result<(), TopologyViolation> {
        self.check_many(TopologyInvariant::all())
    }

    /// Runs a custom subset of invariants in the provided order.
    ///
    /// # Errors
    /// Returns the first [`TopologyViolation`] found.
    pub fn check_many(
        &self,
        invariants: impl IntoIterator<Item = TopologyInvariant>,
    ) -> Result<(), TopologyViolation> {
        self.run_with_mode(invariants, EvaluationMode::FailFast)
    }

    /// Runs a single invariant.
    ///
    /// # Errors
    /// Returns the first [`TopologyViolation`] found.
    pub fn check(&self, invariant: TopologyInvariant) -> Result<(), TopologyViolation> {
        self.check_many([invariant])
    }

    /// Executes every invariant and returns the full set of violations.
    #[must_use]
    pub fn collect_all(&self) -> Vec<TopologyViolation> {
        let mut violations = Vec::new();
        let collected = self.run_with_mode(
            TopologyInvariant::all(),
            EvaluationMode::Collect(&mut violations),
        );
        debug_assert!(collected.is_ok(), "collect mode never fails");
        violations
    }

    fn run_with_mode(
        &self,
        invariants: impl IntoIterator<Item = TopologyInvariant>,
        mut mode: EvaluationMode<'_>,
    ) -> Result<(), TopologyViolation> {
        for invariant in invariants {
            match invariant {
                TopologyInvariant::SingleOutlet => self.single_outlet(&mut mode)?,
                TopologyInvariant::References => self.references(&mut mode)?,
                TopologyInvariant::JunctionFanIn => self.junction_fan_in(&mut mode)?,
                TopologyInvariant::Reachability => self.reachability(&mut mode)?,
            }
        }
        Ok(())
    }

    fn single_outlet(&self, mode: &mut EvaluationMode<'_>) -> Result<(), TopologyViolation> {
        let outlets: Vec<_> = self
            .pipes
            .iter()
            .filter(|pipe| pipe.is_outlet())
            .map(PipeRecord::id)
            .collect();
        match outlets.len() {
            0 => mode.record(TopologyViolation::MissingOutlet),
            1 => Ok(()),
            _ => mode.record(TopologyViolation::MultipleOutlets { pipes: outlets }),
        }
    }

    fn references(&self, mode: &mut EvaluationMode<'_>) -> Result<(), TopologyViolation> {
        let len = self.pipes.len();
        for (position, pipe) in self.pipes.iter().enumerate() {
            let Some(DrainTarget::Pipe(target)) = pipe.drains_to() else {
                if pipe.drains_to().is_none() {
                    mode.record(TopologyViolation::Unresolved { pipe: pipe.id() })?;
                }
                continue;
            };
            let Some(index) = pipe.drain_index() else {
                mode.record(TopologyViolation::DanglingReference {
                    pipe: pipe.id(),
                    target,
                })?;
                continue;
            };
            match self.pipes.get(index) {
                None => mode.record(TopologyViolation::IndexOutOfBounds {
                    pipe: pipe.id(),
                    index,
                    len,
                })?,
                Some(_) if index == position || target == pipe.id() => {
                    mode.record(TopologyViolation::SelfLoop { pipe: pipe.id() })?;
                }
                Some(receiver) if receiver.id() != target => {
                    mode.record(TopologyViolation::DanglingReference {
                        pipe: pipe.id(),
                        target,
                    })?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn junction_fan_in(&self, mode: &mut EvaluationMode<'_>) -> Result<(), TopologyViolation> {
        let mut at_start = vec![0_usize; self.pipes.len()];
        let mut at_end = vec![0_usize; self.pipes.len()];
        for pipe in self.pipes {
            let Some(index) = pipe.drain_index() else {
                continue;
            };
            let Some(receiver) = self.pipes.get(index) else {
                continue;
            };
            let counts = if joins_downstream_end(pipe, receiver) {
                &mut at_end
            } else {
                &mut at_start
            };
            if let Some(count) = counts.get_mut(index) {
                *count += 1;
            }
        }
        for ((pipe, start), end) in self.pipes.iter().zip(at_start).zip(at_end) {
            for upstream in [start, end] {
                if upstream > self.junction_limit {
                    mode.record(TopologyViolation::JunctionOverflow {
                        pipe: pipe.id(),
                        upstream,
                        limit: self.junction_limit,
                    })?;
                }
            }
        }
        Ok(())
    }

    fn reachability(&self, mode: &mut EvaluationMode<'_>) -> Result<(), TopologyViolation> {
        let hops = self.pipes.len();
        for pipe in self.pipes {
            if self.hops_to_outlet(pipe, hops) == Walk::Exceeded {
                mode.record(TopologyViolation::Cycle {
                    pipe: pipe.id(),
                    hops,
                })?;
            }
        }
        Ok(())
    }

    fn hops_to_outlet(&self, start: &PipeRecord, bound: usize) -> Walk {
        let mut current = start;
        for _ in 0..=bound {
            if current.is_outlet() {
                return Walk::Reached;
            }
            match current.drain_index().and_then(|index| self.pipes.get(index)) {
                Some(next) => current = next,
                // Broken links are reported by the reference check.
                None => return Walk::Broken,
            }
        }
        Walk::Exceeded
    }
}

/// Whether `upstream` joins the downstream end of `receiver`. Only the
/// outlet pipe accepts tributaries there; a pipe touching both ends counts
/// at the upstream end, where the builder searches first.
fn joins_downstream_end(upstream: &PipeRecord, receiver: &PipeRecord) -> bool {
    let touches = |point| {
        upstream.start().coincides_with(point, ENDPOINT_TOLERANCE)
            || upstream.end().coincides_with(point, ENDPOINT_TOLERANCE)
    };
    receiver.is_outlet() && touches(receiver.end()) && !touches(receiver.start())
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Walk {
    Reached,
    Broken,
    Exceeded,
}

enum EvaluationMode<'a> {
    FailFast,
    Collect(&'a mut Vec<TopologyViolation>),
}

impl EvaluationMode<'_> {
    fn record(&mut self, violation: TopologyViolation) -> Result<(), TopologyViolation> {
        match self {
            Self::FailFast => Err(violation),
            Self::Collect(sink) => {
                sink.push(violation);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipe::{Coordinate, PipeAttributes, PipeId};
    use rstest::rstest;

    fn id(raw: u32) -> PipeId {
        PipeId::new(raw).expect("non-zero id")
    }

    fn pipe(raw: u32) -> PipeRecord {
        PipeRecord::new(
            id(raw),
            Coordinate::default(),
            Coordinate::new(1.0, 0.0),
            PipeAttributes::default(),
        )
    }

    fn linked(raw: u32, target: u32, index: Option<usize>) -> PipeRecord {
        let mut record = pipe(raw);
        record.set_drain(DrainTarget::Pipe(id(target)), index);
        record
    }

    fn outlet(raw: u32) -> PipeRecord {
        let mut record = pipe(raw);
        record.set_drain(DrainTarget::Outlet, None);
        record
    }

    #[test]
    fn linear_chain_is_valid() {
        let pipes = [outlet(3), linked(2, 3, Some(0)), linked(1, 2, Some(1))];
        NetworkValidator::new(&pipes, 6)
            .check_all()
            .expect("chain must validate");
    }

    #[test]
    fn two_outlets_are_rejected() {
        let pipes = [outlet(1), outlet(2)];
        let err = NetworkValidator::new(&pipes, 6)
            .check_all()
            .expect_err("two outlets must fail");
        assert_eq!(
            err,
            TopologyViolation::MultipleOutlets {
                pipes: vec![id(1), id(2)]
            }
        );
    }

    #[rstest]
    #[case::unresolved(
        vec![outlet(1), pipe(2)],
        TopologyViolation::Unresolved { pipe: id(2) }
    )]
    #[case::dangling(
        vec![outlet(1), linked(2, 9, None)],
        TopologyViolation::DanglingReference { pipe: id(2), target: id(9) }
    )]
    #[case::out_of_bounds(
        vec![outlet(1), linked(2, 1, Some(7))],
        TopologyViolation::IndexOutOfBounds { pipe: id(2), index: 7, len: 2 }
    )]
    #[case::self_loop(
        vec![outlet(1), linked(2, 2, Some(1))],
        TopologyViolation::SelfLoop { pipe: id(2) }
    )]
    #[case::no_outlet(
        vec![linked(1, 2, Some(1)), linked(2, 1, Some(0))],
        TopologyViolation::MissingOutlet
    )]
    fn broken_invariants_name_the_pipe(
        #[case] pipes: Vec<PipeRecord>,
        #[case] expected: TopologyViolation,
    ) {
        let err = NetworkValidator::new(&pipes, 6)
            .check_all()
            .expect_err("validation must fail");
        assert_eq!(err, expected);
    }

    #[test]
    fn cycle_detected_by_hop_bound() {
        let pipes = [
            outlet(1),
            linked(2, 3, Some(2)),
            linked(3, 2, Some(1)),
        ];
        let err = NetworkValidator::new(&pipes, 6)
            .check(TopologyInvariant::Reachability)
            .expect_err("cycle must fail");
        assert_eq!(err, TopologyViolation::Cycle { pipe: id(2), hops: 3 });
    }

    #[test]
    fn fan_in_above_limit_is_rejected() {
        let pipes = [
            outlet(1),
            linked(2, 1, Some(0)),
            linked(3, 1, Some(0)),
            linked(4, 1, Some(0)),
        ];
        let err = NetworkValidator::new(&pipes, 2)
            .check_all()
            .expect_err("fan-in must fail");
        assert_eq!(
            err,
            TopologyViolation::JunctionOverflow {
                pipe: id(1),
                upstream: 3,
                limit: 2
            }
        );
    }

    fn ending_at(raw: u32, end: Coordinate) -> PipeRecord {
        PipeRecord::new(
            id(raw),
            Coordinate::new(end.x, end.y + 10.0),
            end,
            PipeAttributes::default(),
        )
    }

    #[test]
    fn outlet_ends_are_separate_junctions() {
        let mut outlet = PipeRecord::new(
            id(1),
            Coordinate::new(0.0, 0.0),
            Coordinate::new(100.0, 0.0),
            PipeAttributes::default(),
        );
        outlet.set_drain(DrainTarget::Outlet, None);
        let mut pipes = vec![outlet];
        for (raw, point) in [(2, 0.0), (3, 0.0), (4, 100.0)] {
            let mut record = ending_at(raw, Coordinate::new(point, 0.0));
            record.set_drain(DrainTarget::Pipe(id(1)), Some(0));
            pipes.push(record);
        }
        NetworkValidator::new(&pipes, 2)
            .check_all()
            .expect("two pipes at each end fit a limit of two");

        let mut extra = ending_at(5, Coordinate::new(0.0, 0.0));
        extra.set_drain(DrainTarget::Pipe(id(1)), Some(0));
        pipes.push(extra);
        let err = NetworkValidator::new(&pipes, 2)
            .check_all()
            .expect_err("three pipes at the upstream end overflow");
        assert_eq!(
            err,
            TopologyViolation::JunctionOverflow {
                pipe: id(1),
                upstream: 3,
                limit: 2
            }
        );
    }

    #[test]
    fn collect_reports_every_violation() {
        let pipes = [outlet(1), outlet(2), pipe(3), linked(4, 9, None)];
        let violations = NetworkValidator::new(&pipes, 6).collect_all();
        assert_eq!(violations.len(), 3);
    }
}
