//! Instance store
//!
//! Owns every live component in a tree addressed by [`Locator`]s. Inserting
//! an instance inserts its pending children with it; removing an instance
//! destroys its whole subtree, children first. Component hooks are always
//! invoked with the store unlocked, so a `destruct` implementation may
//! resolve other instances.

use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::component::{Capability, CapabilityKind, ComponentRef, Instance};
use crate::error::{Error, Result};
use crate::key::ImplementationKey;
use crate::locator::{validate_segment, Locator};

struct Node {
    component: Option<ComponentRef>,
    key: Option<ImplementationKey>,
    /// Unique within the store; a replacement gets a fresh one
    id: u64,
    order: u64,
    children: BTreeMap<Box<str>, Node>,
}

impl Node {
    fn root() -> Self {
        Self {
            component: None,
            key: None,
            id: 0,
            order: 0,
            children: BTreeMap::new(),
        }
    }

    fn find(&self, locator: &Locator) -> Option<&Node> {
        locator
            .segments()
            .try_fold(self, |node, segment| node.children.get(segment))
    }

    fn find_mut(&mut self, locator: &Locator) -> Option<&mut Node> {
        locator
            .segments()
            .try_fold(self, |node, segment| node.children.get_mut(segment))
    }

    /// Children sorted by insertion order
    fn ordered_children(&self) -> Vec<(&str, &Node)> {
        let mut children: Vec<_> = self
            .children
            .iter()
            .map(|(name, node)| (name.as_ref(), node))
            .collect();
        children.sort_by_key(|(_, node)| node.order);
        children
    }

    fn count(&self) -> usize {
        usize::from(self.component.is_some())
            + self.children.values().map(Node::count).sum::<usize>()
    }
}

struct Tree {
    root: Node,
    next_order: u64,
    revision: u64,
}

impl Tree {
    fn build_node(&mut self, instance: Instance) -> Node {
        let (key, component, children) = instance.into_parts();
        self.next_order += 1;
        let mut node = Node {
            component: Some(Arc::from(component)),
            key,
            id: self.next_order,
            order: self.next_order,
            children: BTreeMap::new(),
        };
        for (name, child) in children {
            let child = self.build_node(child);
            node.children.insert(name.into_boxed_str(), child);
        }
        node
    }
}

/// Destroy a detached subtree: children in reverse insertion order, then the node itself
fn destroy(node: Node, locator: &Locator) -> usize {
    let Node {
        component,
        key,
        children,
        ..
    } = node;

    let mut children: Vec<_> = children.into_iter().collect();
    children.sort_by_key(|(_, child)| std::cmp::Reverse(child.order));

    let mut destroyed = 0;
    for (name, child) in children {
        let child_locator = locator.child(&name).unwrap_or_else(|_| locator.clone());
        destroyed += destroy(child, &child_locator);
    }

    if let Some(component) = component {
        component.destruct();
        destroyed += 1;
        match key {
            Some(key) => log::debug!("Destroyed {} ({})", locator, key),
            None => log::debug!("Destroyed {}", locator),
        }
    }
    destroyed
}

/// One live instance as seen by [`InstanceStore::visit`]
#[derive(Clone)]
pub struct Entry {
    pub locator: Locator,
    pub key: Option<ImplementationKey>,
    pub component: ComponentRef,
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("locator", &self.locator)
            .field("key", &self.key)
            .finish()
    }
}

/// Tree of live component instances
pub struct InstanceStore {
    tree: RwLock<Tree>,
}

impl Default for InstanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstanceStore {
    pub fn new() -> Self {
        Self {
            tree: RwLock::new(Tree {
                root: Node::root(),
                next_order: 0,
                revision: 0,
            }),
        }
    }

    /// Insert `instance` (and its pending children) as `parent.name`
    pub fn insert(
        &self,
        parent: &Locator,
        name: &str,
        instance: impl Into<Instance>,
    ) -> Result<Locator> {
        validate_segment(name)?;
        let locator = parent.child(name)?;
        let instance = instance.into();

        let mut tree = self.tree.write();
        {
            let parent_node = tree
                .root
                .find(parent)
                .filter(|node| node.component.is_some() || parent.is_root())
                .ok_or_else(|| Error::MissingParent(parent.clone()))?;
            if parent_node.children.contains_key(name) {
                return Err(Error::NameCollision(locator));
            }
        }

        let node = tree.build_node(instance);
        let key = node.key.clone();
        let parent_node = tree
            .root
            .find_mut(parent)
            .ok_or_else(|| Error::MissingParent(parent.clone()))?;
        parent_node.children.insert(name.into(), node);
        drop(tree);

        match key {
            Some(key) => log::debug!("Inserted {} ({})", locator, key),
            None => log::debug!("Inserted {}", locator),
        }
        Ok(locator)
    }

    /// Live component at `locator`
    pub fn resolve(&self, locator: &Locator) -> Option<ComponentRef> {
        self.tree
            .read()
            .root
            .find(locator)
            .and_then(|node| node.component.clone())
    }

    /// Resolve `locator` and require a capability
    pub fn resolve_capability(&self, locator: &Locator, kind: CapabilityKind) -> Result<ComponentRef> {
        let component = self
            .resolve(locator)
            .ok_or_else(|| Error::NotFound(locator.clone()))?;
        if component.implements(kind) {
            Ok(component)
        } else {
            Err(Error::MissingCapability {
                locator: locator.clone(),
                capability: kind,
            })
        }
    }

    /// Resolve `locator` and run `f` against its `C` capability
    pub fn with_capability<C, R, F>(&self, locator: &Locator, f: F) -> Result<R>
    where
        C: Capability + ?Sized,
        F: FnOnce(&C) -> R,
    {
        let component = self.resolve_capability(locator, C::KIND)?;
        let capability = component.query::<C>().ok_or_else(|| Error::MissingCapability {
            locator: locator.clone(),
            capability: C::KIND,
        })?;
        Ok(f(capability))
    }

    pub fn contains(&self, locator: &Locator) -> bool {
        self.tree
            .read()
            .root
            .find(locator)
            .map_or(false, |node| node.component.is_some())
    }

    pub fn key_of(&self, locator: &Locator) -> Option<ImplementationKey> {
        self.tree
            .read()
            .root
            .find(locator)
            .and_then(|node| node.key.clone())
    }

    /// Identity of the live instance at `locator`
    ///
    /// A replacement at the same locator gets a new id.
    pub fn instance_id(&self, locator: &Locator) -> Option<u64> {
        self.tree
            .read()
            .root
            .find(locator)
            .filter(|node| node.component.is_some())
            .map(|node| node.id)
    }

    /// Destroy the subtree at `locator`, returning how many instances died
    ///
    /// Removing the root clears the store.
    pub fn remove(&self, locator: &Locator) -> usize {
        let Some(parent) = locator.parent() else {
            return self.clear();
        };
        let Some(name) = locator.name() else {
            return 0;
        };

        let detached = {
            let mut tree = self.tree.write();
            let detached = tree
                .root
                .find_mut(&parent)
                .and_then(|node| node.children.remove(name));
            if detached.is_some() {
                tree.revision += 1;
            }
            detached
        };
        detached.map_or(0, |node| destroy(node, locator))
    }

    /// Swap the instance at `locator` for `instance`, destroying the old subtree
    ///
    /// The locator stays the same, so weak references follow the new instance.
    pub fn replace(&self, locator: &Locator, instance: impl Into<Instance>) -> Result<()> {
        if locator.is_root() {
            return Err(Error::invalid_name("$", "the root cannot be replaced"));
        }
        let instance = instance.into();

        let mut tree = self.tree.write();
        if !tree.root.find(locator).map_or(false, |node| node.component.is_some()) {
            return Err(Error::NotFound(locator.clone()));
        }
        let mut node = tree.build_node(instance);
        let old = tree
            .root
            .find_mut(locator)
            .map(|slot| {
                node.order = slot.order;
                std::mem::replace(slot, node)
            })
            .ok_or_else(|| Error::NotFound(locator.clone()))?;
        tree.revision += 1;
        drop(tree);

        log::debug!("Replaced {}", locator);
        destroy(old, locator);
        Ok(())
    }

    /// Locators of the direct children of `locator`, in insertion order
    pub fn children(&self, locator: &Locator) -> Vec<Locator> {
        let tree = self.tree.read();
        let Some(node) = tree.root.find(locator) else {
            return Vec::new();
        };
        node.ordered_children()
            .into_iter()
            .filter_map(|(name, _)| locator.child(name).ok())
            .collect()
    }

    /// Snapshot of every live instance, pre-order, siblings in insertion order
    pub fn entries(&self) -> Vec<Entry> {
        fn collect(node: &Node, locator: &Locator, out: &mut Vec<Entry>) {
            if let Some(component) = &node.component {
                out.push(Entry {
                    locator: locator.clone(),
                    key: node.key.clone(),
                    component: Arc::clone(component),
                });
            }
            for (name, child) in node.ordered_children() {
                if let Ok(child_locator) = locator.child(name) {
                    collect(child, &child_locator, out);
                }
            }
        }

        let tree = self.tree.read();
        let mut out = Vec::new();
        collect(&tree.root, &Locator::root(), &mut out);
        out
    }

    /// Walk every live instance; the store is unlocked while `f` runs
    pub fn visit(&self, mut f: impl FnMut(&Entry)) {
        for entry in self.entries() {
            f(&entry);
        }
    }

    /// Live instances created from any of `keys`
    pub fn live_with_keys(&self, keys: &[ImplementationKey]) -> Vec<Locator> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.key.as_ref().map_or(false, |key| keys.contains(key)))
            .map(|entry| entry.locator)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tree.read().root.count()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.read().root.children.is_empty()
    }

    /// Destroy everything; top-level instances go in reverse insertion order
    pub fn clear(&self) -> usize {
        let detached = {
            let mut tree = self.tree.write();
            tree.revision += 1;
            std::mem::replace(&mut tree.root, Node::root())
        };
        destroy(detached, &Locator::root())
    }

    /// Counter bumped whenever an existing instance is replaced or destroyed
    ///
    /// Inserting never changes it, so a reader that cached resolved
    /// instances only needs to re-check them when the revision moved.
    pub fn revision(&self) -> u64 {
        self.tree.read().revision
    }
}

impl Drop for InstanceStore {
    fn drop(&mut self) {
        let destroyed = self.clear();
        if destroyed > 0 {
            log::debug!("Instance store dropped with {} live instances", destroyed);
        }
    }
}

impl fmt::Debug for InstanceStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceStore")
            .field("live", &self.len())
            .finish()
    }
}
