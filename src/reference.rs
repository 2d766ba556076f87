use std::fmt::{Display, Formatter};

/// Handle to a MetaNode stored in a [`Store`][crate::store::Store].
///
/// A handle is an arena index paired with the generation of the slot at the
/// time the node was created. Once the node is garbage collected the slot
/// generation is bumped, so stale handles are detected on access instead of
/// silently aliasing a newer node.
///
/// The two terminals live in the reserved slots 0 and 1 and are never freed.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Ref {
    index: u32,
    generation: u32,
}

impl Ref {
    /// The constant zero function.
    pub const ZERO: Ref = Ref::new(0, 0);
    /// The constant one function over the empty scope.
    pub const ONE: Ref = Ref::new(1, 0);

    pub(crate) const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Return the arena index of the node.
    pub const fn index(self) -> usize {
        self.index as usize
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub const fn is_zero(self) -> bool {
        self.index == 0
    }

    pub const fn is_one(self) -> bool {
        self.index == 1
    }

    pub const fn is_terminal(self) -> bool {
        self.index <= 1
    }
}

impl Display for Ref {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.index {
            0 => write!(f, "0"),
            1 => write!(f, "1"),
            i => write!(f, "@{}", i),
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_terminals() {
        assert!(Ref::ZERO.is_zero());
        assert!(Ref::ZERO.is_terminal());
        assert!(!Ref::ZERO.is_one());
        assert!(Ref::ONE.is_one());
        assert!(Ref::ONE.is_terminal());
        assert!(!Ref::new(2, 0).is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(Ref::ZERO.to_string(), "0");
        assert_eq!(Ref::ONE.to_string(), "1");
        assert_eq!(Ref::new(7, 3).to_string(), "@7");
    }

    #[test]
    fn test_generation_distinguishes_handles() {
        assert_ne!(Ref::new(5, 0), Ref::new(5, 1));
        assert_eq!(Ref::new(5, 1).index(), 5);
    }
}
