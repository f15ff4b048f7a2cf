//! The drainage graph: pipe arena, upstream adjacency, and drainage order.

mod builder;
mod validate;

use tracing::{info, instrument};

pub use self::{
    builder::NetworkTopologyBuilder,
    validate::{NetworkValidator, TopologyInvariant},
};
use crate::{
    Result,
    error::ConfigError,
    pipe::{PipeId, PipeRecord},
};

/// How drain targets are obtained.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopologySource {
    /// Reconstruct from endpoint coincidence, starting at the given outlet.
    Geometric {
        /// Identifier of the outlet pipe.
        outlet: PipeId,
    },
    /// Use the drain targets already carried by the records.
    Declared,
}

/// A validated drainage tree.
///
/// The structure is immutable once assembled; only the hydraulic outputs of
/// the pipes are written by the runners.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkGraph {
    pipes: Vec<PipeRecord>,
    upstream: Vec<Vec<usize>>,
    order: Vec<usize>,
    outlet: usize,
}

impl NetworkGraph {
    /// Resolves, validates, and indexes `pipes`.
    ///
    /// # Errors
    /// Returns [`ConfigError`]s for an empty input, duplicate identifiers,
    /// invalid attributes, or a missing outlet, and the first
    /// [`crate::TopologyViolation`] found by the validator.
    #[instrument(
        name = "core.assemble",
        err,
        skip(pipes, builder),
        fields(pipes = pipes.len(), source = ?source),
    )]
    pub fn assemble(
        mut pipes: Vec<PipeRecord>,
        source: TopologySource,
        builder: &NetworkTopologyBuilder,
    ) -> Result<Self> {
        if pipes.is_empty() {
            return Err(ConfigError::EmptyNetwork.into());
        }
        builder::index_by_id(&pipes)?;
        for pipe in &pipes {
            pipe.attributes.validate(pipe.id())?;
        }
        match source {
            TopologySource::Geometric { outlet } => builder.resolve_geometric(&mut pipes, outlet)?,
            TopologySource::Declared => builder.resolve_declared(&mut pipes)?,
        }
        validate_pipes(&pipes, builder.junction_limit())?;
        Ok(Self::index(pipes))
    }

    fn index(pipes: Vec<PipeRecord>) -> Self {
        let mut upstream = vec![Vec::new(); pipes.len()];
        let mut outlet = 0;
        for (position, pipe) in pipes.iter().enumerate() {
            match pipe.drain_index() {
                Some(receiver) => {
                    if let Some(list) = upstream.get_mut(receiver) {
                        list.push(position);
                    }
                }
                None => outlet = position,
            }
        }
        // Breadth-first from the outlet, reversed: every pipe follows all
        // pipes draining into it.
        let mut order = Vec::with_capacity(pipes.len());
        order.push(outlet);
        let mut cursor = 0;
        while let Some(&current) = order.get(cursor) {
            if let Some(list) = upstream.get(current) {
                order.extend(list.iter().copied());
            }
            cursor += 1;
        }
        order.reverse();
        info!(pipes = pipes.len(), "network assembled");
        Self {
            pipes,
            upstream,
            order,
            outlet,
        }
    }

    /// Pipes in input order.
    #[must_use]
    pub fn pipes(&self) -> &[PipeRecord] {
        &self.pipes
    }

    /// Number of pipes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pipes.len()
    }

    /// Always `false`; assembly rejects empty input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pipes.is_empty()
    }

    /// Pipe at `index`.
    #[must_use]
    pub fn pipe(&self, index: usize) -> Option<&PipeRecord> {
        self.pipes.get(index)
    }

    /// Pipe with identifier `id`.
    #[must_use]
    pub fn find(&self, id: PipeId) -> Option<&PipeRecord> {
        self.pipes.iter().find(|pipe| pipe.id() == id)
    }

    /// Indices of the pipes draining into `index`.
    #[must_use]
    pub fn upstream(&self, index: usize) -> &[usize] {
        self.upstream.get(index).map_or(&[], Vec::as_slice)
    }

    /// Indices ordered so that every pipe follows all of its upstream pipes.
    #[must_use]
    pub fn drainage_order(&self) -> &[usize] {
        &self.order
    }

    /// Index of the outlet pipe.
    #[must_use]
    pub const fn outlet(&self) -> usize {
        self.outlet
    }

    pub(crate) fn pipe_mut(&mut self, index: usize) -> Option<&mut PipeRecord> {
        self.pipes.get_mut(index)
    }

    /// Returns the pipes, consuming the graph.
    #[must_use]
    pub fn into_pipes(self) -> Vec<PipeRecord> {
        self.pipes
    }
}

#[instrument(name = "core.validate", err, skip(pipes), fields(pipes = pipes.len()))]
fn validate_pipes(pipes: &[PipeRecord], junction_limit: usize) -> Result<()> {
    NetworkValidator::new(pipes, junction_limit).check_all()?;
    Ok(())
}
