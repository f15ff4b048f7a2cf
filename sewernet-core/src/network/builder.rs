//! Drain-target resolution, either from endpoint geometry or from
//! externally assigned identifiers.

use std::collections::HashMap;

use tracing::{debug, instrument};

use crate::{
    error::ConfigError,
    params::{DEFAULT_JUNCTION_LIMIT, ENDPOINT_TOLERANCE},
    pipe::{Coordinate, DrainTarget, PipeId, PipeRecord},
};

/// Resolves the drain target of every pipe.
///
/// Geometric resolution starts from the outlet and walks upstream with an
/// explicit stack of `(pipe, search point)` pairs. At each search point the
/// unresolved pipes are scanned in input order; a pipe with an endpoint
/// within [`ENDPOINT_TOLERANCE`] of the point becomes upstream of the current
/// pipe and its opposite endpoint is pushed. A search point stops accepting
/// matches once the junction limit is reached, leaving further coincident
/// pipes unresolved for the validator to report.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkTopologyBuilder {
    junction_limit: usize,
    tolerance: f64,
}

impl Default for NetworkTopologyBuilder {
    fn default() -> Self {
        Self {
            junction_limit: DEFAULT_JUNCTION_LIMIT,
            tolerance: ENDPOINT_TOLERANCE,
        }
    }
}

impl NetworkTopologyBuilder {
    /// Creates a builder with `junction_limit` within `[1, 6]`.
    ///
    /// # Errors
    /// Returns [`ConfigError::JunctionLimitOutOfRange`] otherwise.
    pub const fn new(junction_limit: usize) -> Result<Self, ConfigError> {
        if junction_limit < 1 || junction_limit > DEFAULT_JUNCTION_LIMIT {
            return Err(ConfigError::JunctionLimitOutOfRange {
                got: junction_limit,
            });
        }
        Ok(Self {
            junction_limit,
            tolerance: ENDPOINT_TOLERANCE,
        })
    }

    /// Configured junction limit.
    #[must_use]
    pub const fn junction_limit(&self) -> usize {
        self.junction_limit
    }

    /// Links pipes by endpoint coincidence, starting from `outlet`.
    ///
    /// Any previous assignment is discarded first, so running the builder
    /// twice on the same input yields the same targets.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingOutlet`] when `outlet` is not among the
    /// pipes; nothing is modified in that case.
    ///
    /// # Examples
    /// ```
    /// use sewernet_core::{Coordinate, DrainTarget, NetworkTopologyBuilder, PipeAttributes, PipeId, PipeRecord};
    ///
    /// let attrs = PipeAttributes::default();
    /// let mut pipes = vec![
    ///     PipeRecord::new(PipeId::new(1)?, Coordinate::new(0.0, 0.0), Coordinate::new(10.0, 0.0), attrs.clone()),
    ///     PipeRecord::new(PipeId::new(2)?, Coordinate::new(10.0, 0.0), Coordinate::new(20.0, 0.0), attrs),
    /// ];
    /// NetworkTopologyBuilder::default().resolve_geometric(&mut pipes, PipeId::new(2)?)?;
    /// assert_eq!(pipes[0].drains_to(), Some(DrainTarget::Pipe(PipeId::new(2)?)));
    /// assert_eq!(pipes[1].drains_to(), Some(DrainTarget::Outlet));
    /// # Ok::<(), sewernet_core::ConfigError>(())
    /// ```
    #[instrument(
        name = "core.build_topology",
        err,
        skip(self, pipes),
        fields(pipes = pipes.len(), outlet = %outlet, junction_limit = self.junction_limit),
    )]
    pub fn resolve_geometric(
        &self,
        pipes: &mut [PipeRecord],
        outlet: PipeId,
    ) -> Result<(), ConfigError> {
        let outlet_index = pipes
            .iter()
            .position(|pipe| pipe.id() == outlet)
            .ok_or(ConfigError::MissingOutlet { outlet })?;
        for pipe in pipes.iter_mut() {
            pipe.clear_drain();
        }

        let mut resolved = vec![false; pipes.len()];
        let mut stack: Vec<(usize, Coordinate)> = Vec::new();
        if let Some(pipe) = pipes.get_mut(outlet_index) {
            pipe.set_drain(DrainTarget::Outlet, None);
            stack.push((outlet_index, pipe.end()));
            stack.push((outlet_index, pipe.start()));
        }
        if let Some(flag) = resolved.get_mut(outlet_index) {
            *flag = true;
        }

        let mut linked = 0_usize;
        while let Some((current, point)) = stack.pop() {
            let Some(receiver) = pipes.get(current).map(PipeRecord::id) else {
                continue;
            };
            let mut matches = 0;
            for (candidate, pipe) in pipes.iter_mut().enumerate() {
                if matches >= self.junction_limit {
                    break;
                }
                if resolved.get(candidate).copied().unwrap_or(true) {
                    continue;
                }
                let Some(opposite) = self.opposite_endpoint(pipe, point) else {
                    continue;
                };
                pipe.set_drain(DrainTarget::Pipe(receiver), Some(current));
                if let Some(flag) = resolved.get_mut(candidate) {
                    *flag = true;
                }
                matches += 1;
                linked += 1;
                stack.push((candidate, opposite));
            }
        }
        debug!(
            linked,
            unresolved = pipes.len() - linked - 1,
            "geometric topology resolved"
        );
        Ok(())
    }

    /// Resolves the drain index of every pipe from its declared target.
    ///
    /// Pipes without a declared target stay unresolved and targets naming an
    /// unknown pipe keep no index; the validator reports both.
    ///
    /// # Errors
    /// Returns [`ConfigError::DuplicatePipeId`] when two pipes share an id.
    #[instrument(name = "core.resolve_declared", err, skip(self, pipes), fields(pipes = pipes.len()))]
    pub fn resolve_declared(&self, pipes: &mut [PipeRecord]) -> Result<(), ConfigError> {
        let positions = index_by_id(pipes)?;
        for pipe in pipes.iter_mut() {
            match pipe.drains_to() {
                Some(DrainTarget::Pipe(target)) => {
                    let index = positions.get(&target).copied();
                    pipe.set_drain(DrainTarget::Pipe(target), index);
                }
                Some(DrainTarget::Outlet) => pipe.set_drain(DrainTarget::Outlet, None),
                None => {}
            }
        }
        Ok(())
    }

    fn opposite_endpoint(&self, pipe: &PipeRecord, point: Coordinate) -> Option<Coordinate> {
        if pipe.end().coincides_with(point, self.tolerance) {
            Some(pipe.start())
        } else if pipe.start().coincides_with(point, self.tolerance) {
            Some(pipe.end())
        } else {
            None
        }
    }
}

/// Maps each pipe id to its position, rejecting duplicates.
pub(crate) fn index_by_id(pipes: &[PipeRecord]) -> Result<HashMap<PipeId, usize>, ConfigError> {
    let mut positions = HashMap::with_capacity(pipes.len());
    for (index, pipe) in pipes.iter().enumerate() {
        if positions.insert(pipe.id(), index).is_some() {
            return Err(ConfigError::DuplicatePipeId { pipe: pipe.id() });
        }
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        network::validate::NetworkValidator,
        pipe::PipeAttributes,
        test_utils::{pipe_between, suite_proptest_config},
    };
    use proptest::prelude::*;
    use rstest::rstest;

    fn id(raw: u32) -> PipeId {
        PipeId::new(raw).expect("non-zero id")
    }

    #[rstest]
    #[case::zero(0)]
    #[case::seven(7)]
    fn junction_limit_range_is_enforced(#[case] limit: usize) {
        let err = NetworkTopologyBuilder::new(limit).expect_err("limit must be rejected");
        assert_eq!(err, ConfigError::JunctionLimitOutOfRange { got: limit });
    }

    #[test]
    fn missing_outlet_is_config_error() {
        let mut pipes = vec![pipe_between(1, (0.0, 0.0), (1.0, 0.0))];
        let err = NetworkTopologyBuilder::default()
            .resolve_geometric(&mut pipes, id(5))
            .expect_err("outlet must be found");
        assert_eq!(err, ConfigError::MissingOutlet { outlet: id(5) });
    }

    #[test]
    fn near_miss_endpoints_are_connected() {
        let mut pipes = vec![
            pipe_between(1, (0.0, 0.0), (9.95, 0.04)),
            pipe_between(2, (10.0, 0.0), (20.0, 0.0)),
        ];
        NetworkTopologyBuilder::default()
            .resolve_geometric(&mut pipes, id(2))
            .expect("outlet exists");
        assert_eq!(pipes[0].drains_to(), Some(DrainTarget::Pipe(id(2))));
        assert_eq!(pipes[0].drain_index(), Some(1));
    }

    #[test]
    fn reversed_digitization_is_accepted() {
        let mut pipes = vec![
            pipe_between(1, (10.0, 0.0), (0.0, 0.0)),
            pipe_between(2, (-5.0, 5.0), (0.0, 0.0)),
            pipe_between(3, (20.0, 0.0), (10.0, 0.0)),
        ];
        NetworkTopologyBuilder::default()
            .resolve_geometric(&mut pipes, id(3))
            .expect("outlet exists");
        assert_eq!(pipes[0].drains_to(), Some(DrainTarget::Pipe(id(3))));
        assert_eq!(pipes[1].drains_to(), Some(DrainTarget::Pipe(id(1))));
    }

    #[test]
    fn junction_limit_leaves_extra_pipes_unresolved() {
        let mut pipes = vec![
            pipe_between(1, (0.0, 0.0), (10.0, 0.0)),
            pipe_between(2, (-10.0, 0.0), (0.0, 0.0)),
            pipe_between(3, (0.0, 10.0), (0.0, 0.0)),
            pipe_between(4, (0.0, -10.0), (0.0, 0.0)),
        ];
        let builder = NetworkTopologyBuilder::new(2).expect("valid limit");
        builder
            .resolve_geometric(&mut pipes, id(1))
            .expect("outlet exists");
        let resolved = pipes[1..]
            .iter()
            .filter(|pipe| pipe.drains_to().is_some())
            .count();
        assert_eq!(resolved, 2);
        assert!(pipes[3].drains_to().is_none());
        let err = NetworkValidator::new(&pipes, 2)
            .check_all()
            .expect_err("third pipe must be unresolved");
        assert_eq!(
            err,
            crate::TopologyViolation::Unresolved { pipe: id(4) }
        );
    }

    #[test]
    fn declared_targets_are_indexed() {
        let mut pipes = vec![
            pipe_between(3, (0.0, 0.0), (1.0, 0.0)).with_drain_target(DrainTarget::Outlet),
            pipe_between(1, (0.0, 0.0), (1.0, 0.0)).with_drain_target(DrainTarget::Pipe(id(2))),
            pipe_between(2, (0.0, 0.0), (1.0, 0.0)).with_drain_target(DrainTarget::Pipe(id(3))),
        ];
        NetworkTopologyBuilder::default()
            .resolve_declared(&mut pipes)
            .expect("ids are unique");
        assert_eq!(pipes[1].drain_index(), Some(2));
        assert_eq!(pipes[2].drain_index(), Some(0));
        assert_eq!(pipes[0].drain_index(), None);
    }

    #[test]
    fn declared_duplicates_are_rejected() {
        let mut pipes = vec![
            pipe_between(1, (0.0, 0.0), (1.0, 0.0)),
            PipeRecord::new(
                id(1),
                Coordinate::default(),
                Coordinate::default(),
                PipeAttributes::default(),
            ),
        ];
        let err = NetworkTopologyBuilder::default()
            .resolve_declared(&mut pipes)
            .expect_err("duplicates must fail");
        assert_eq!(err, ConfigError::DuplicatePipeId { pipe: id(1) });
    }

    /// Builds a random dendritic network: pipe `k` starts at its own node and
    /// ends at the start node of an earlier pipe (or the outlet node).
    fn random_tree(parents: &[usize]) -> Vec<PipeRecord> {
        let node = |k: usize| {
            let angle = f64::from(u32::try_from(k).unwrap_or(0)) * 0.7;
            let radius = 10.0 * f64::from(u32::try_from(k).unwrap_or(0) + 1);
            (radius * angle.cos(), radius * angle.sin())
        };
        let mut pipes = vec![pipe_between(1, node(0), (-1000.0, -1000.0))];
        for (offset, parent) in parents.iter().enumerate() {
            let k = offset + 1;
            let parent = parent % k;
            let raw = u32::try_from(k + 1).unwrap_or(u32::MAX);
            pipes.push(pipe_between(raw, node(k), node(parent)));
        }
        pipes
    }

    proptest! {
        #![proptest_config(suite_proptest_config(64))]

        #[test]
        fn geometric_resolution_is_idempotent(
            parents in proptest::collection::vec(0_usize..1000, 0..12),
        ) {
            let mut pipes = random_tree(&parents);
            let builder = NetworkTopologyBuilder::default();
            builder.resolve_geometric(&mut pipes, id(1)).expect("outlet exists");
            let first: Vec<_> = pipes.iter().map(|p| (p.drains_to(), p.drain_index())).collect();
            builder.resolve_geometric(&mut pipes, id(1)).expect("outlet exists");
            let second: Vec<_> = pipes.iter().map(|p| (p.drains_to(), p.drain_index())).collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn valid_trees_reach_the_outlet(
            parents in proptest::collection::vec(0_usize..3, 0..12),
        ) {
            let mut pipes = random_tree(&parents);
            NetworkTopologyBuilder::default()
                .resolve_geometric(&mut pipes, id(1))
                .expect("outlet exists");
            let violations = NetworkValidator::new(&pipes, DEFAULT_JUNCTION_LIMIT).collect_all();
            let overflow_only = violations
                .iter()
                .all(|v| matches!(v, crate::TopologyViolation::Unresolved { .. }));
            prop_assert!(overflow_only);
            let outlets = pipes.iter().filter(|p| p.is_outlet()).count();
            prop_assert_eq!(outlets, 1);
        }
    }
}
