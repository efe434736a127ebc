//! Puzzles as tuples of disjoint regular-closed pieces.

use crate::float_types::Real;
use crate::set::{Set, structural_hash};
use crate::simplify::simp;
use crate::errors::CsgError;
use crate::transform::{Transformation, TransformationGroup};
use crate::voxel::VoxelEngine;

/// The space every piece must live in.
#[derive(Debug, Clone, PartialEq)]
pub enum StateTopology {
    /// Euclidean topology of ℝ³.
    Euclidean,
    /// A bounded region of ℝ³.
    Region(Set),
}

impl StateTopology {
    pub fn space(&self) -> Set {
        match self {
            StateTopology::Euclidean => Set::Universal,
            StateTopology::Region(s) => s.clone(),
        }
    }
}

/// The monoid of paths pieces may be moved along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionGroup {
    /// `SE(3)*`: paths of proper rigid motions.
    SpecialEuclideanPaths,
    /// `E(3)*`
    EuclideanPaths,
    /// `Aff(3)*`
    AffinePaths,
}

impl ActionGroup {
    pub fn group(self) -> TransformationGroup {
        match self {
            ActionGroup::SpecialEuclideanPaths => TransformationGroup::SpecialEuclidean,
            ActionGroup::EuclideanPaths => TransformationGroup::Euclidean,
            ActionGroup::AffinePaths => TransformationGroup::Affine,
        }
    }

    pub fn admits(self, t: &Transformation) -> bool {
        self.group().contains(t)
    }
}

/// An immutable puzzle state.
#[derive(Debug, Clone, PartialEq)]
pub struct Puzzle {
    pieces: Vec<Set>,
    pub ordered: bool,
    pub topology: StateTopology,
    pub actions: ActionGroup,
}

impl Puzzle {
    /// Ordered puzzle in ℝ³ moved by proper rigid motions.
    pub fn new(pieces: Vec<Set>) -> Self {
        Puzzle {
            pieces,
            ordered: true,
            topology: StateTopology::Euclidean,
            actions: ActionGroup::SpecialEuclideanPaths,
        }
    }

    /// Pieces are kept in canonical hash order.
    pub fn unordered(pieces: Vec<Set>) -> Self {
        Puzzle {
            ordered: false,
            ..Puzzle::new(pieces)
        }
        .canonicalized()
    }

    pub fn with_topology(self, topology: StateTopology) -> Self {
        Puzzle { topology, ..self }
    }

    pub fn with_actions(self, actions: ActionGroup) -> Self {
        Puzzle { actions, ..self }
    }

    /// Same kind of puzzle with other pieces.
    pub fn with_pieces(&self, pieces: Vec<Set>) -> Self {
        Puzzle {
            pieces,
            ordered: self.ordered,
            topology: self.topology.clone(),
            actions: self.actions,
        }
        .canonicalized()
    }

    fn canonicalized(mut self) -> Self {
        if !self.ordered {
            self.pieces.sort_by_cached_key(structural_hash::<Set>);
        }
        self
    }

    pub fn pieces(&self) -> &[Set] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Pairwise disjoint interiors.
    pub fn no_collision(&self, engine: &VoxelEngine) -> bool {
        let interiors: Vec<Set> = self.pieces.iter().map(Set::interior).collect();
        for (i, a) in interiors.iter().enumerate() {
            for (j, b) in interiors.iter().enumerate().skip(i + 1) {
                if !engine.is_disjoint(a, b) {
                    log::debug!("pieces {i} and {j} overlap");
                    return false;
                }
            }
        }
        true
    }

    /// Every piece is a regular-closed subset of the state space, and no two collide.
    pub fn is_valid_state(&self, engine: &VoxelEngine) -> bool {
        let space = self.topology.space();
        self.pieces
            .iter()
            .all(|p| p.is_regular_closed() && engine.is_subset(p, &space))
            && self.no_collision(engine)
    }

    /// Cut every piece by every knife in turn. A knife is a list of sets
    /// covering space, typically a set and its exterior; pieces without
    /// interior are dropped.
    pub fn cross_common(&self, knives: &[Vec<Set>], engine: &VoxelEngine) -> Puzzle {
        let mut pieces = self.pieces.clone();
        for knife in knives {
            pieces = pieces
                .iter()
                .flat_map(|piece| {
                    knife
                        .iter()
                        .map(move |blade| Set::intersection([piece.clone(), blade.clone()]))
                })
                .filter(|p| engine.has_interior(p))
                .collect();
            log::debug!("cut into {} pieces", pieces.len());
        }
        self.with_pieces(pieces)
    }

    /// Every piece simplified against the engine's grid.
    pub fn simplified(&self, engine: &VoxelEngine) -> Result<Puzzle, CsgError> {
        let pieces = self
            .pieces
            .iter()
            .map(|p| simp(engine, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self.with_pieces(pieces))
    }

    /// Sum of piece volumes on the engine's grid.
    pub fn volume(&self, engine: &VoxelEngine) -> Real {
        self.pieces.iter().map(|p| engine.volume(p)).sum()
    }
}
