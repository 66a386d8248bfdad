//! Address Tree - Containers, slots and id-chains
//!
//! Objects on the controller are addressed by the path of slot indices from
//! a root container down to the object:
//!
//! ```text
//! user root ()
//!   ├─[0] → CurrentTicks          id-chain (0)
//!   ├─[1] → DynamicContainer      id-chain (1)
//!   │      ├─[0] → PersistentValue    id-chain (1, 0)
//!   │      └─[3] → PersistChangeValue id-chain (1, 3)
//!   └─[2] → ...
//!
//! system root ()
//!   ├─[0] → SystemId
//!   └─[1] → SystemTime
//! ```
//!
//! Id-chains are always derived from a container and a slot; proxies never
//! store them.

use core::fmt;

/// Position of an object within its container
pub type Slot = u8;

/// Ordered sequence of slots locating an object from its root
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdChain(Vec<Slot>);

impl IdChain {
    /// The empty chain (a root container)
    pub const fn root() -> Self {
        Self(Vec::new())
    }

    /// Chain of this address extended by `slot`
    pub fn child(&self, slot: Slot) -> Self {
        let mut chain = self.0.clone();
        chain.push(slot);
        Self(chain)
    }

    /// Split into the containing chain and the final slot
    ///
    /// Returns `None` for the root chain, which has no containing slot.
    pub fn split_last(&self) -> Option<(IdChain, Slot)> {
        let (last, prefix) = self.0.split_last()?;
        Some((IdChain(prefix.to_vec()), *last))
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[Slot] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Slot> + '_ {
        self.0.iter().copied()
    }
}

impl From<Vec<Slot>> for IdChain {
    fn from(slots: Vec<Slot>) -> Self {
        Self(slots)
    }
}

impl From<&[Slot]> for IdChain {
    fn from(slots: &[Slot]) -> Self {
        Self(slots.to_vec())
    }
}

impl<const N: usize> From<[Slot; N]> for IdChain {
    fn from(slots: [Slot; N]) -> Self {
        Self(slots.to_vec())
    }
}

impl fmt::Display for IdChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, slot) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{slot}")?;
        }
        write!(f, ")")
    }
}

/// Which of the controller's two object trees an address belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RootKind {
    /// User objects, created and deleted through profiles
    User,
    /// Pre-instantiated system values (id, clock)
    System,
}

/// Anything that can host objects at slots
pub trait Container {
    /// Value-equal description of this container's location
    fn container_ref(&self) -> ContainerRef;

    /// Id-chain of this container
    fn id_chain(&self) -> IdChain {
        self.container_ref().id_chain()
    }

    /// Id-chain of the object at `slot` in this container
    fn id_chain_for(&self, slot: Slot) -> IdChain {
        self.id_chain().child(slot)
    }
}

/// Transient, value-equal stand-in for a container
///
/// Reconstructed container chains (e.g. from a profile listing) are built
/// from these rather than from live container proxies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    /// One of the two root containers
    Root(RootKind),
    /// A container stored at `slot` inside `parent`
    Nested {
        parent: Box<ContainerRef>,
        slot: Slot,
    },
}

impl ContainerRef {
    /// The user-object root
    pub const fn user_root() -> Self {
        ContainerRef::Root(RootKind::User)
    }

    /// The system-object root
    pub const fn system_root() -> Self {
        ContainerRef::Root(RootKind::System)
    }

    /// Container living at `slot` inside this one
    pub fn nested(&self, slot: Slot) -> Self {
        ContainerRef::Nested {
            parent: Box::new(self.clone()),
            slot,
        }
    }

    /// Rebuild the container chain for `id_chain` below the given root,
    /// walking the chain prefix by prefix
    pub fn from_id_chain(root: RootKind, id_chain: &IdChain) -> Self {
        id_chain
            .iter()
            .fold(ContainerRef::Root(root), |container, slot| container.nested(slot))
    }

    /// Root this container hangs from
    pub fn root_kind(&self) -> RootKind {
        match self {
            ContainerRef::Root(kind) => *kind,
            ContainerRef::Nested { parent, .. } => parent.root_kind(),
        }
    }

    /// Containing container, `None` for a root
    pub fn parent(&self) -> Option<&ContainerRef> {
        match self {
            ContainerRef::Root(_) => None,
            ContainerRef::Nested { parent, .. } => Some(parent),
        }
    }
}

impl Container for ContainerRef {
    fn container_ref(&self) -> ContainerRef {
        self.clone()
    }

    fn id_chain(&self) -> IdChain {
        match self {
            ContainerRef::Root(_) => IdChain::root(),
            ContainerRef::Nested { parent, slot } => parent.id_chain().child(*slot),
        }
    }
}

/// One of the controller's two root containers
///
/// Owned by the controller; every other container is derived from one.
#[derive(Debug, PartialEq, Eq)]
pub struct RootContainer {
    kind: RootKind,
}

impl RootContainer {
    pub(crate) const fn new(kind: RootKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> RootKind {
        self.kind
    }
}

impl Container for RootContainer {
    fn container_ref(&self) -> ContainerRef {
        ContainerRef::Root(self.kind)
    }

    fn id_chain(&self) -> IdChain {
        IdChain::root()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_chain_is_empty() {
        let root = RootContainer::new(RootKind::User);
        assert!(root.id_chain().is_root());
        assert_eq!(root.id_chain_for(4), IdChain::from([4]));
        assert!(RootContainer::new(RootKind::System).id_chain().is_root());
    }

    #[test]
    fn test_nested_chain_extends_parent() {
        let parent = ContainerRef::user_root().nested(1);
        let child = parent.nested(7);
        assert_eq!(parent.id_chain(), IdChain::from([1]));
        assert_eq!(child.id_chain(), parent.id_chain().child(7));
        assert_eq!(child.id_chain_for(2), IdChain::from([1, 7, 2]));
    }

    #[test]
    fn test_reconstruct_container_chain() {
        let chain = IdChain::from([3, 0, 9]);
        let container = ContainerRef::from_id_chain(RootKind::User, &chain);
        assert_eq!(container.id_chain(), chain);
        assert_eq!(container.root_kind(), RootKind::User);
        assert_eq!(container.parent().map(|p| p.id_chain()), Some(IdChain::from([3, 0])));

        // Reconstruction is value-equal to building by hand
        let by_hand = ContainerRef::user_root().nested(3).nested(0).nested(9);
        assert_eq!(container, by_hand);
    }

    #[test]
    fn test_split_last() {
        let chain = IdChain::from([0x50, 0x51, 0x52]);
        assert_eq!(chain.split_last(), Some((IdChain::from([0x50, 0x51]), 0x52)));
        assert_eq!(IdChain::root().split_last(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(IdChain::from([1, 2]).to_string(), "(1, 2)");
        assert_eq!(IdChain::root().to_string(), "()");
    }
}
