//! Seeded synthetic drainage trees.
//!
//! Networks are complete trees: the outlet pipe receives `branching` pipes at
//! its upstream end, each of which receives `branching` more, down to
//! `depth` levels. Pipes fan out upstream within a half-plane and the ground
//! rises along every pipe, so both topology sources reconstruct the same
//! tree.

use std::collections::VecDeque;
use std::f64::consts::{FRAC_PI_2, PI};

use rand::{Rng, SeedableRng, rngs::SmallRng};
use sewernet_core::{
    ConfigError, Coordinate, DEFAULT_JUNCTION_LIMIT, DrainTarget, PipeAttributes, PipeId,
    PipeRecord, PipeReport,
};

/// Largest network the generator accepts.
pub const MAX_PIPES: usize = 100_000;

const OUTLET_GROUND: f64 = 10.0;

/// Errors raised while generating a synthetic network.
#[derive(Debug, thiserror::Error)]
pub enum SyntheticError {
    /// Every non-leaf pipe needs at least one tributary.
    #[error("branching factor must be at least 1")]
    ZeroBranching,
    /// Tributaries plus the receiving pipe exceed the junction limit.
    #[error("branching factor {branching} exceeds the junction limit of {limit} pipes")]
    BranchingAboveJunctionLimit {
        /// Requested branching factor.
        branching: usize,
        /// Pipes allowed to meet at one point.
        limit: usize,
    },
    /// The tree would exceed [`MAX_PIPES`].
    #[error("a tree of depth {depth} and branching {branching} exceeds {MAX_PIPES} pipes")]
    TooManyPipes {
        /// Requested depth.
        depth: usize,
        /// Requested branching factor.
        branching: usize,
    },
    /// A pipe identifier was rejected.
    #[error(transparent)]
    Id(#[from] ConfigError),
}

/// Shape and seed of a synthetic network.
#[derive(Clone, Copy, Debug)]
pub struct SyntheticNetworkConfig {
    /// Levels below the outlet pipe.
    pub depth: usize,
    /// Tributaries of every non-leaf pipe.
    pub branching: usize,
    /// RNG seed for reproducibility.
    pub seed: u64,
}

impl SyntheticNetworkConfig {
    /// Number of pipes in the complete tree, if it fits in [`MAX_PIPES`].
    #[must_use]
    pub fn pipe_count(&self) -> Option<usize> {
        let mut total = 0_usize;
        let mut level = 1_usize;
        for _ in 0..=self.depth {
            total = total.checked_add(level)?;
            level = level.checked_mul(self.branching)?;
        }
        (total <= MAX_PIPES).then_some(total)
    }
}

/// A generated network with its declared drain targets.
#[derive(Clone, Debug)]
pub struct SyntheticNetwork {
    outlet: PipeId,
    pipes: Vec<PipeRecord>,
    targets: Vec<DrainTarget>,
}

struct Pending {
    id: PipeId,
    upstream: Coordinate,
    ground: f64,
    heading: f64,
    level: usize,
}

impl SyntheticNetwork {
    /// Generates the tree described by `config`.
    ///
    /// # Errors
    /// Returns [`SyntheticError`] when the branching factor is zero or above
    /// the junction limit, or the tree is too large.
    pub fn generate(config: &SyntheticNetworkConfig) -> Result<Self, SyntheticError> {
        if config.branching == 0 {
            return Err(SyntheticError::ZeroBranching);
        }
        if config.branching >= DEFAULT_JUNCTION_LIMIT {
            return Err(SyntheticError::BranchingAboveJunctionLimit {
                branching: config.branching,
                limit: DEFAULT_JUNCTION_LIMIT,
            });
        }
        let count = config.pipe_count().ok_or(SyntheticError::TooManyPipes {
            depth: config.depth,
            branching: config.branching,
        })?;

        let mut rng = SmallRng::seed_from_u64(config.seed);
        let outlet = PipeId::new(1)?;
        let mut network = Self {
            outlet,
            pipes: Vec::with_capacity(count),
            targets: Vec::with_capacity(count),
        };
        let length = rng.gen_range(60.0..120.0);
        let downstream = Coordinate::new(length, 0.0);
        let upstream = Coordinate::new(0.0, 0.0);
        let ground = network.push(outlet, upstream, downstream, OUTLET_GROUND, &mut rng);
        network.targets.push(DrainTarget::Outlet);

        let mut queue = VecDeque::from([Pending {
            id: outlet,
            upstream,
            ground,
            heading: PI,
            level: 0,
        }]);
        let mut next = 2_u32;
        while let Some(parent) = queue.pop_front() {
            if parent.level == config.depth {
                continue;
            }
            let spread = FRAC_PI_2 / (parent.level as f64 + 1.0);
            for k in 0..config.branching {
                let id = PipeId::new(next)?;
                next += 1;
                let offset = (k as f64 + 0.5) / config.branching as f64 - 0.5;
                let heading = parent.heading + offset * spread;
                let length = rng.gen_range(60.0..120.0);
                let start = Coordinate::new(
                    parent.upstream.x + length * heading.cos(),
                    parent.upstream.y + length * heading.sin(),
                );
                let ground = network.push(id, start, parent.upstream, parent.ground, &mut rng);
                network.targets.push(DrainTarget::Pipe(parent.id));
                queue.push_back(Pending {
                    id,
                    upstream: start,
                    ground,
                    heading,
                    level: parent.level + 1,
                });
            }
        }
        Ok(network)
    }

    /// Appends a pipe and returns the ground elevation at its upstream end.
    fn push(
        &mut self,
        id: PipeId,
        start: Coordinate,
        end: Coordinate,
        ground_end: f64,
        rng: &mut SmallRng,
    ) -> f64 {
        let length = start.distance(end);
        let ground_start = ground_end + rng.gen_range(0.005..0.02) * length;
        self.pipes.push(PipeRecord::new(
            id,
            start,
            end,
            PipeAttributes {
                length,
                initial_elevation: ground_start,
                final_elevation: ground_end,
                drain_area: rng.gen_range(0.3..2.0),
                runoff_coefficient: rng.gen_range(0.4..0.8),
                minimum_slope: 0.002,
                average_residence_time: rng.gen_range(2.0..6.0),
                average_slope: rng.gen_range(0.005..0.03),
                ..PipeAttributes::default()
            },
        ));
        ground_start
    }

    /// Number of pipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    /// Whether the network holds no pipes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// The outlet pipe.
    #[must_use]
    pub const fn outlet(&self) -> PipeId {
        self.outlet
    }

    /// Records without drain targets, for geometric reconstruction.
    #[must_use]
    pub fn undeclared(&self) -> Vec<PipeRecord> {
        self.pipes.clone()
    }

    /// Records carrying their drain targets.
    #[must_use]
    pub fn declared(&self) -> Vec<PipeRecord> {
        self.pipes
            .iter()
            .zip(&self.targets)
            .map(|(pipe, target)| pipe.clone().with_drain_target(*target))
            .collect()
    }
}

/// Copies designed sizes onto `pipes` so they can be verified.
///
/// `reports` must follow the order of `pipes`, as design reports do.
#[must_use]
pub fn with_sizes(mut pipes: Vec<PipeRecord>, reports: &[PipeReport]) -> Vec<PipeRecord> {
    for (pipe, report) in pipes.iter_mut().zip(reports) {
        pipe.attributes.diameter = Some(report.diameter);
    }
    pipes
}
