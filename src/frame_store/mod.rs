//! Append-only per-frame record storage.
//!
//! [`FrameStore`] keeps one fixed-size record per captured frame in a radix
//! tree with a fixed fan-out of `2^BITS` children per node. A new store is a
//! single flat leaf. When every slot of the current tree is used the store
//! re-roots itself: a new top node adopts the old root as its first child and
//! the append that triggered the growth allocates the sibling path for the
//! next record. Existing subtrees are never touched, so records are never
//! copied or moved once stored.
//!
//! With the default fan-out of 1024 a tree of depth 4 addresses 2^40
//! records, comfortably beyond the `u32` frame-number space.

mod number;

use log::{debug, trace};
pub use number::FrameNumber;

use crate::error::{ResourceExhausted, reserve_exact};

/// Default number of index bits consumed per tree level (1024-way fan-out).
pub const DEFAULT_LEVEL_BITS: u32 = 10;

#[derive(Debug)]
enum Node<T> {
    Leaf(Vec<T>),
    Branch(Vec<Node<T>>),
}

/// Summary of the storage released by [`FrameStore::teardown`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TeardownReport {
    /// Records released.
    pub frames: u64,
    /// Tree depth at teardown (1 for a flat store).
    pub depth: u32,
    /// Nodes released per level, leaves first.
    pub nodes_per_level: Vec<u64>,
}

/// Dense radix-tree storage addressed by [`FrameNumber`].
///
/// # Examples
///
/// ```
/// use framestate::{FrameNumber, FrameStore};
///
/// let mut store: FrameStore<&str> = FrameStore::new();
/// let first = store.append("syn").expect("allocation succeeds");
/// let second = store.append("syn-ack").expect("allocation succeeds");
/// assert_eq!(first, FrameNumber::new(1));
/// assert_eq!(store.lookup(second), Some(&"syn-ack"));
/// assert_eq!(store.lookup(FrameNumber::NONE), None);
/// assert_eq!(store.lookup(FrameNumber::new(3)), None);
/// ```
#[derive(Debug)]
pub struct FrameStore<T, const BITS: u32 = DEFAULT_LEVEL_BITS> {
    root: Node<T>,
    depth: u32,
    len: u64,
}

impl<T, const BITS: u32> Default for FrameStore<T, BITS> {
    fn default() -> Self { Self::new() }
}

impl<T, const BITS: u32> FrameStore<T, BITS> {
    /// Children per branch and records per leaf.
    pub const FANOUT: usize = 1 << BITS;
    const MASK: u64 = (1 << BITS) - 1;

    /// Create an empty store. No memory is reserved until the first append.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: Node::Leaf(Vec::new()),
            depth: 1,
            len: 0,
        }
    }

    /// Number of stored records.
    #[must_use]
    pub const fn len(&self) -> u64 { self.len }

    /// Report whether the store holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool { self.len == 0 }

    /// Current tree depth; 1 while the store is a flat array.
    #[must_use]
    pub const fn depth(&self) -> u32 { self.depth }

    /// Records addressable without growing another level.
    #[must_use]
    pub const fn capacity(&self) -> u64 { 1_u64 << (BITS * self.depth) }

    /// Store `record` as the next frame and return its number.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceExhausted`] when a new block cannot be allocated or
    /// the frame-number space is used up. Either condition is fatal for the
    /// capture being loaded.
    pub fn append(&mut self, record: T) -> Result<FrameNumber, ResourceExhausted> {
        let Some(number) = u32::try_from(self.len + 1)
            .ok()
            .filter(|n| *n != u32::MAX)
        else {
            return Err(ResourceExhausted::FrameNumbers { frames: self.len });
        };

        if self.len == self.capacity() {
            self.grow()?;
        }

        let index = self.len;
        let leaf = self.leaf_for_append(index)?;
        if leaf.capacity() == 0 {
            reserve_exact(leaf, Self::FANOUT, "frame leaf", index)?;
        }
        leaf.push(record);
        self.len += 1;
        Ok(FrameNumber::new(number))
    }

    /// Borrow the record stored for `frame`.
    ///
    /// Returns `None` for [`FrameNumber::NONE`] and for frames beyond the
    /// current count; neither is an error.
    #[must_use]
    pub fn lookup(&self, frame: FrameNumber) -> Option<&T> {
        let index = frame.slot()?;
        if index >= self.len {
            return None;
        }

        let mut node = &self.root;
        for height in (1..self.depth).rev() {
            let Node::Branch(children) = node else {
                return None;
            };
            node = children.get(Self::slot_at(index, height))?;
        }
        match node {
            Node::Leaf(records) => records.get(Self::slot_at(index, 0)),
            Node::Branch(_) => None,
        }
    }

    /// Borrow the most recently appended record.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        let frame = u32::try_from(self.len).ok().map(FrameNumber::new)?;
        self.lookup(frame)
    }

    /// Iterate over `(frame, record)` pairs in capture order.
    pub fn iter(&self) -> impl Iterator<Item = (FrameNumber, &T)> + '_ {
        (1..=self.len)
            .filter_map(|n| u32::try_from(n).ok().map(FrameNumber::new))
            .filter_map(|frame| self.lookup(frame).map(|record| (frame, record)))
    }

    /// Nodes populated at each level, leaves first, derived from the record
    /// count alone.
    ///
    /// A level at height `h` holds `ceil(len / FANOUT^(h+1))` nodes. Only the
    /// last node of each level (the growing edge) can be partially filled.
    #[must_use]
    pub fn level_occupancy(&self) -> Vec<u64> {
        (0..self.depth)
            .map(|height| Self::nodes_at(self.len, height))
            .collect()
    }

    /// Children populated in the `position`-th node at `height`.
    ///
    /// Every node except the one on the growing edge is full.
    #[must_use]
    pub fn populated_children(&self, height: u32, position: u64) -> u64 {
        let below = if height == 0 {
            self.len
        } else {
            Self::nodes_at(self.len, height - 1)
        };
        let full = Self::FANOUT as u64;
        below.saturating_sub(position * full).min(full)
    }

    /// Release every level of the tree, returning the store to its empty
    /// state.
    pub fn teardown(&mut self) -> TeardownReport {
        let report = TeardownReport {
            frames: self.len,
            depth: self.depth,
            nodes_per_level: self.level_occupancy(),
        };

        let root = std::mem::replace(&mut self.root, Node::Leaf(Vec::new()));
        let released = self.release(root);
        debug_assert_eq!(released, self.len, "teardown released a different record count");

        self.depth = 1;
        self.len = 0;
        debug!(
            "frame store released: frames={}, depth={}, nodes={:?}",
            report.frames, report.depth, report.nodes_per_level
        );
        report
    }

    fn nodes_at(len: u64, height: u32) -> u64 {
        let shift = BITS * (height + 1);
        if shift >= u64::BITS {
            return u64::from(len > 0);
        }
        (len + (1_u64 << shift) - 1) >> shift
    }

    const fn slot_at(index: u64, height: u32) -> usize {
        ((index >> (BITS * height)) & Self::MASK) as usize
    }

    /// Walk the tree top-down, dropping one level at a time.
    ///
    /// Each branch is drained using the occupancy computed from the record
    /// count so the walk never inspects slots that were never populated.
    fn release(&self, root: Node<T>) -> u64 {
        let mut level = vec![root];
        let mut released = 0;
        for height in (0..self.depth).rev() {
            let mut next = Vec::new();
            for (position, node) in (0_u64..).zip(level) {
                let expected = self.populated_children(height, position);
                match node {
                    Node::Branch(children) => {
                        debug_assert_eq!(children.len() as u64, expected);
                        next.extend(children);
                    }
                    Node::Leaf(records) => {
                        debug_assert_eq!(records.len() as u64, expected);
                        released += records.len() as u64;
                    }
                }
            }
            level = next;
        }
        released
    }

    fn grow(&mut self) -> Result<(), ResourceExhausted> {
        let mut children = Vec::new();
        reserve_exact(&mut children, Self::FANOUT, "frame branch", self.len)?;
        let old_root = std::mem::replace(&mut self.root, Node::Branch(Vec::new()));
        children.push(old_root);
        self.root = Node::Branch(children);
        self.depth += 1;
        debug!(
            "frame store grew a level: depth={}, capacity={}",
            self.depth,
            self.capacity()
        );
        Ok(())
    }

    /// Descend to the leaf that will hold slot `index`, allocating the missing
    /// nodes on the growing edge.
    fn leaf_for_append(&mut self, index: u64) -> Result<&mut Vec<T>, ResourceExhausted> {
        let mut node = &mut self.root;
        for height in (1..self.depth).rev() {
            node = match node {
                Node::Branch(children) => {
                    let slot = Self::slot_at(index, height);
                    if slot == children.len() {
                        children.push(Self::allocate_node(height - 1, index)?);
                    }
                    &mut children[slot]
                }
                Node::Leaf(_) => unreachable!("leaf found above the bottom level"),
            };
        }
        match node {
            Node::Leaf(records) => Ok(records),
            Node::Branch(_) => unreachable!("branch found at the bottom level"),
        }
    }

    fn allocate_node(height: u32, frames: u64) -> Result<Node<T>, ResourceExhausted> {
        if height == 0 {
            trace!("allocating frame leaf: frames={frames}");
            let mut records = Vec::new();
            reserve_exact(&mut records, Self::FANOUT, "frame leaf", frames)?;
            Ok(Node::Leaf(records))
        } else {
            let mut children = Vec::new();
            reserve_exact(&mut children, Self::FANOUT, "frame branch", frames)?;
            Ok(Node::Branch(children))
        }
    }
}
