use core::fmt;

/// A stable reference to a node stored in a [`List`].
///
/// Handles stay valid until the node is removed. Every slot carries a generation
/// counter that is bumped when the slot is freed, so a handle that outlived its
/// node is rejected instead of silently addressing whatever reused the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Handle {
    index: usize,
    generation: u64,
}

/// A node in the doubly linked list.
///
/// Contains a value and the slot indices of its older and younger neighbours.
/// This structure is not meant to be used directly by users of the `List`.
struct Node<T> {
    /// The value stored in this node.
    value: T,
    /// Slot of the next older node, `None` for the oldest node.
    older: Option<usize>,
    /// Slot of the next younger node, `None` for the youngest node.
    younger: Option<usize>,
}

/// One arena slot: either a live node or a hole waiting on the free list.
struct Slot<T> {
    generation: u64,
    node: Option<Node<T>>,
}

/// A doubly linked list over an arena of slots.
///
/// Nodes are ordered from oldest to youngest. Appending at the youngest end,
/// unlinking from any position and popping the oldest node are all O(1). Links
/// are slot indices rather than pointers, so removing a node can never leave a
/// dangling reference behind: stale [`Handle`]s are detected by generation.
///
/// # Examples
///
/// ```ignore
/// let mut list = List::new();
/// let a = list.push_youngest("a");
/// let _b = list.push_youngest("b");
///
/// assert_eq!(list.oldest(), Some(&"a"));
/// assert_eq!(list.remove(a), Some("a"));
/// assert_eq!(list.remove(a), None);
/// ```
pub(crate) struct List<T> {
    /// Backing storage for all nodes, live or free.
    slots: Vec<Slot<T>>,
    /// Indices of vacant slots available for reuse.
    free: Vec<usize>,
    /// Slot of the oldest node.
    oldest: Option<usize>,
    /// Slot of the youngest node.
    youngest: Option<usize>,
    /// Current number of live nodes.
    len: usize,
}

impl<T> List<T> {
    /// Creates an empty list.
    pub(crate) fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty list with room for `cap` nodes before reallocating.
    pub(crate) fn with_capacity(cap: usize) -> Self {
        List {
            slots: Vec::with_capacity(cap),
            free: Vec::new(),
            oldest: None,
            youngest: None,
            len: 0,
        }
    }

    /// Returns the current number of nodes in the list.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the list contains no nodes.
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, handle: Handle) -> Option<&Node<T>> {
        let slot = self.slots.get(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_ref()
    }

    fn node_mut(&mut self, handle: Handle) -> Option<&mut Node<T>> {
        let slot = self.slots.get_mut(handle.index)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.node.as_mut()
    }

    /// Returns true if `handle` still refers to a live node.
    pub(crate) fn contains(&self, handle: Handle) -> bool {
        self.node(handle).is_some()
    }

    /// Gets a reference to the value behind `handle`, if it is still live.
    pub(crate) fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle).map(|node| &node.value)
    }

    /// Gets a mutable reference to the value behind `handle`, if it is still live.
    pub(crate) fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.node_mut(handle).map(|node| &mut node.value)
    }

    /// Returns the value of the oldest node.
    pub(crate) fn oldest(&self) -> Option<&T> {
        let index = self.oldest?;
        self.slots[index].node.as_ref().map(|node| &node.value)
    }

    /// Returns the handle of the oldest node.
    pub(crate) fn oldest_handle(&self) -> Option<Handle> {
        let index = self.oldest?;
        Some(Handle {
            index,
            generation: self.slots[index].generation,
        })
    }

    /// Appends a value at the youngest end and returns its handle.
    pub(crate) fn push_youngest(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            older: None,
            younger: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    node: Some(node),
                });
                self.slots.len() - 1
            }
        };
        self.attach_youngest(index);
        self.len += 1;
        Handle {
            index,
            generation: self.slots[index].generation,
        }
    }

    /// Unlinks the node behind `handle` and returns its value.
    ///
    /// Returns `None` if the handle is stale, so removing twice is a no-op.
    pub(crate) fn remove(&mut self, handle: Handle) -> Option<T> {
        if !self.contains(handle) {
            return None;
        }
        self.detach(handle.index);
        self.len -= 1;
        let slot = &mut self.slots[handle.index];
        slot.generation = slot.generation.wrapping_add(1);
        let node = slot.node.take()?;
        self.free.push(handle.index);
        Some(node.value)
    }

    /// Removes the oldest node and returns its value.
    pub(crate) fn pop_oldest(&mut self) -> Option<T> {
        let handle = self.oldest_handle()?;
        self.remove(handle)
    }

    /// Moves the node behind `handle` to the youngest end.
    ///
    /// Returns `false` if the handle is stale.
    pub(crate) fn move_to_youngest(&mut self, handle: Handle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        if self.youngest == Some(handle.index) {
            return true;
        }
        self.detach(handle.index);
        self.attach_youngest(handle.index);
        true
    }

    /// Iterates over the values from oldest to youngest.
    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            next: self.oldest,
        }
    }

    /// Clears the list, dropping all values and invalidating every handle.
    pub(crate) fn clear(&mut self) {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.node.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index);
            }
        }
        self.oldest = None;
        self.youngest = None;
        self.len = 0;
    }

    /// Repairs the neighbours of the node in slot `index` and clears its links.
    fn detach(&mut self, index: usize) {
        let (older, younger) = match self.slots[index].node.as_mut() {
            Some(node) => (node.older.take(), node.younger.take()),
            None => return,
        };
        match older {
            Some(older) => self.link_mut(older).younger = younger,
            None => self.oldest = younger,
        }
        match younger {
            Some(younger) => self.link_mut(younger).older = older,
            None => self.youngest = older,
        }
    }

    /// Links the detached node in slot `index` after the current youngest node.
    fn attach_youngest(&mut self, index: usize) {
        let previous = self.youngest;
        {
            let node = self.link_mut(index);
            node.older = previous;
            node.younger = None;
        }
        match previous {
            Some(previous) => self.link_mut(previous).younger = Some(index),
            None => self.oldest = Some(index),
        }
        self.youngest = Some(index);
    }

    /// Returns the live node in slot `index`.
    ///
    /// Only called with indices reachable from the list's own links, which
    /// always point at occupied slots.
    fn link_mut(&mut self, index: usize) -> &mut Node<T> {
        match self.slots[index].node.as_mut() {
            Some(node) => node,
            None => unreachable!("list link points at a vacant slot"),
        }
    }
}

impl<T> Default for List<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for List<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List")
            .field("length", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

/// Iterator over a [`List`] from oldest to youngest.
pub(crate) struct Iter<'a, T> {
    list: &'a List<T>,
    next: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next?;
        let node = self.list.slots[index].node.as_ref()?;
        self.next = node.younger;
        Some(&node.value)
    }
}
