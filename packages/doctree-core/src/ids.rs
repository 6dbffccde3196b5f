use std::fmt;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Unique identifier for a node in the document. Never reused within a store.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}", self.0)
    }
}

/// Monotonic id source owned by a store.
///
/// `u64::MAX` is never handed out: once `next` reaches it the space is
/// exhausted and allocation fails instead of wrapping.
#[derive(Clone, Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn allocate(&mut self) -> Result<NodeId> {
        if self.next == u64::MAX {
            return Err(Error::IdSpaceExhausted);
        }
        let id = NodeId(self.next);
        self.next += 1;
        Ok(id)
    }

    /// Number of ids that can still be allocated.
    pub fn remaining(&self) -> u64 {
        u64::MAX - self.next
    }

    /// Make sure future allocations never collide with `id`.
    pub fn observe(&mut self, id: NodeId) -> Result<()> {
        let after = id.0.checked_add(1).ok_or(Error::IdSpaceExhausted)?;
        self.next = self.next.max(after);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocates_monotonically() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.allocate(), Ok(NodeId(0)));
        assert_eq!(ids.allocate(), Ok(NodeId(1)));
        ids.observe(NodeId(10)).unwrap();
        assert_eq!(ids.allocate(), Ok(NodeId(11)));
        ids.observe(NodeId(3)).unwrap();
        assert_eq!(ids.allocate(), Ok(NodeId(12)));
    }

    #[test]
    fn top_of_the_id_space_is_rejected() {
        let mut ids = IdAllocator::default();
        assert_eq!(ids.observe(NodeId(u64::MAX)), Err(Error::IdSpaceExhausted));
        assert_eq!(ids.allocate(), Ok(NodeId(0)));

        ids.observe(NodeId(u64::MAX - 1)).unwrap();
        assert_eq!(ids.remaining(), 0);
        assert_eq!(ids.allocate(), Err(Error::IdSpaceExhausted));
    }
}
