//! Contracting/expanding path assembly shared by both U-Net variants.

use crate::scope::Scope;

/// Output of one contracting stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Contracted<H> {
    /// Downsampled output, threaded to the next stage.
    pub bottom: H,
    /// Pre-downsampling output, kept for the mirrored expanding stage.
    pub side: H,
}

/// Per-stage strategy plugged into [assemble].
pub trait Cell {
    type Handle;

    fn contract(&self, stage: usize, input: Self::Handle) -> Contracted<Self::Handle>;

    fn bottom(&self, input: Self::Handle) -> Self::Handle;

    /// `stage` counts expanding stages from the bottom, starting at 0.
    fn expand(&self, stage: usize, bottom: Self::Handle, side: Self::Handle) -> Self::Handle;
}

/// Runs `depth` contracting stages, the bottom stage and `depth` expanding stages.
///
/// Expanding stage `i` receives the side output of contracting stage `depth - 1 - i`.
pub fn assemble<C: Cell>(cell: &C, depth: usize, input: C::Handle) -> C::Handle {
    let mut skips = Vec::with_capacity(depth);
    let mut current = input;

    for stage in 0..depth {
        let Contracted { bottom, side } = cell.contract(stage, current);
        skips.push(side);
        current = bottom;
    }

    current = cell.bottom(current);

    skips.reverse();
    for (stage, side) in skips.into_iter().enumerate() {
        current = cell.expand(stage, current, side);
    }

    current
}

/// Scoped names of every stage in a network of a given depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub contracting: Vec<String>,
    pub bottom: String,
    pub expanding: Vec<String>,
}

impl Topology {
    pub fn new(scope: &Scope, depth: usize) -> Self {
        let contracting = scope.child("contracting");
        let expanding = scope.child("expanding");

        Self {
            contracting: (0..depth)
                .map(|i| contracting.name(&format!("step_{i}")))
                .collect(),
            bottom: scope.name(&format!("step_{depth}")),
            expanding: (0..depth)
                .map(|i| expanding.name(&format!("step_{}", depth + i + 1)))
                .collect(),
        }
    }

    pub fn depth(&self) -> usize {
        self.contracting.len()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    /// Handles carry the index of the contracting stage they came from.
    #[derive(Default)]
    struct TaggingCell {
        consumed: RefCell<Vec<(usize, usize)>>,
        bottoms: RefCell<usize>,
    }

    impl Cell for TaggingCell {
        type Handle = Option<usize>;

        fn contract(&self, stage: usize, _input: Option<usize>) -> Contracted<Option<usize>> {
            Contracted {
                bottom: None,
                side: Some(stage),
            }
        }

        fn bottom(&self, input: Option<usize>) -> Option<usize> {
            *self.bottoms.borrow_mut() += 1;
            input
        }

        fn expand(
            &self,
            stage: usize,
            _bottom: Option<usize>,
            side: Option<usize>,
        ) -> Option<usize> {
            self.consumed
                .borrow_mut()
                .push((stage, side.expect("side outputs are tagged")));
            side
        }
    }

    #[test]
    fn expanding_stages_consume_mirrored_side_outputs() {
        for depth in 1..6 {
            let cell = TaggingCell::default();
            let last = assemble(&cell, depth, None);

            let consumed = cell.consumed.into_inner();
            assert_eq!(consumed.len(), depth);
            for (stage, origin) in consumed {
                assert_eq!(origin, depth - 1 - stage);
            }
            assert_eq!(last, Some(0));
            assert_eq!(cell.bottoms.into_inner(), 1);
        }
    }

    #[test]
    fn zero_depth_is_just_the_bottom() {
        let cell = TaggingCell::default();
        assert_eq!(assemble(&cell, 0, Some(7)), Some(7));
        assert!(cell.consumed.into_inner().is_empty());
    }

    #[test]
    fn topology_names_every_stage_once() {
        let topology = Topology::new(&Scope::root("unet"), 3);

        assert_eq!(topology.depth(), 3);
        assert_eq!(topology.expanding.len(), 3);
        assert_eq!(topology.contracting[0], "unet/contracting/step_0");
        assert_eq!(topology.bottom, "unet/step_3");
        assert_eq!(topology.expanding[2], "unet/expanding/step_6");
    }
}
