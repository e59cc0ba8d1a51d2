//! # nstree
//!
//! A persistent namespace tree keyed by segmented paths.
//!
//! Entries such as feature flags or configuration keys are addressed by paths
//! like `billing:invoices:export`. Every update returns a new [`Tree`]
//! snapshot; older snapshots stay valid and share every untouched subtree
//! with the new one.
//!
//! ## Example
//!
//! ```rust
//! use nstree::Tree;
//!
//! let tree: Tree<bool> = Tree::new();
//! let tree = tree.upsert(&["billing", "invoices"], true).unwrap();
//! let tree = tree.upsert(&["billing", "export"], false).unwrap();
//!
//! assert_eq!(tree.get(&["billing", "invoices"]), Some(&true));
//! assert_eq!(tree.get(&["billing"]), None);
//!
//! let smaller = tree.remove(&["billing", "invoices"]);
//! assert_eq!(smaller.get(&["billing", "invoices"]), None);
//! assert_eq!(tree.get(&["billing", "invoices"]), Some(&true));
//! ```

use std::fmt;
use std::sync::Arc;

use log::{debug, trace};

mod error;
pub mod path;

pub use error::{Result, TreeError};
pub use path::{Path, PathConfig, Segment};

// =============================================================================
// Nodes
// =============================================================================

/// A named point in the hierarchy.
///
/// A node may hold a value, children, or both. A node whose children are
/// absent or empty is a leaf.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TreeNode<V> {
    key: Segment,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    value: Option<Arc<V>>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    children: Option<Tree<V>>,
}

impl<V> TreeNode<V> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn segment(&self) -> &Segment {
        &self.key
    }

    pub fn value(&self) -> Option<&V> {
        self.value.as_deref()
    }

    pub fn children(&self) -> Option<&Tree<V>> {
        self.children.as_ref()
    }

    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.as_ref().map_or(true, Tree::is_empty)
    }

    fn rebuilt(&self, value: Option<Arc<V>>, children: Option<Tree<V>>) -> Arc<Self> {
        Arc::new(Self {
            key: self.key.clone(),
            value,
            children,
        })
    }
}

/// Builds the single-child chain `head -> rest[0] -> ... -> rest[n-1]` with
/// `value` on the deepest node.
fn chain<V>(head: &Segment, rest: &[Segment], value: Arc<V>) -> Arc<TreeNode<V>> {
    let mut value = Some(value);
    let mut children = None;
    for key in rest.iter().rev() {
        let node = TreeNode {
            key: key.clone(),
            value: value.take(),
            children: children.take(),
        };
        children = Some(Tree::from_nodes(vec![Arc::new(node)]));
    }
    Arc::new(TreeNode {
        key: head.clone(),
        value,
        children,
    })
}

// =============================================================================
// Tree
// =============================================================================

/// How [`Tree::remove_with`] treats ancestors emptied by a removal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Pruning {
    /// Drop an ancestor whose children became empty and which holds no value.
    /// An emptied ancestor that holds a value turns into a leaf.
    #[default]
    Cascade,
    /// Only filter leaves at the level where each segment is matched, and keep
    /// emptied ancestors with an empty children sequence. A leaf matching a
    /// segment is filtered even when the path continues below it.
    LevelOnly,
}

/// An immutable, ordered sequence of root nodes.
///
/// Cloning is O(1). Sibling order is insertion order.
#[derive(PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Tree<V> {
    nodes: Arc<[Arc<TreeNode<V>>]>,
}

impl<V> Tree<V> {
    pub fn new() -> Self {
        Self::from_nodes(Vec::new())
    }

    fn from_nodes(nodes: Vec<Arc<TreeNode<V>>>) -> Self {
        Self {
            nodes: nodes.into(),
        }
    }

    /// Builds a tree by upserting each entry in order.
    pub fn from_entries<I: IntoIterator<Item = (Path, V)>>(entries: I) -> Self {
        entries.into_iter().collect()
    }

    /// Whether the tree has no roots.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of stored values. Walks the whole tree.
    pub fn len(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| {
                usize::from(n.value.is_some()) + n.children.as_ref().map_or(0, Tree::len)
            })
            .sum()
    }

    pub fn roots(&self) -> &[Arc<TreeNode<V>>] {
        &self.nodes
    }

    /// The node keyed `key` at this level.
    pub fn find(&self, key: &str) -> Option<&Arc<TreeNode<V>>> {
        self.nodes.iter().find(|n| &*n.key == key)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.nodes.iter().position(|n| &*n.key == key)
    }

    /// Copy of this level with the node at `idx` replaced, or dropped when
    /// `node` is `None`.
    fn replace_at(&self, idx: usize, node: Option<Arc<TreeNode<V>>>) -> Self {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (i, n) in self.nodes.iter().enumerate() {
            if i != idx {
                nodes.push(n.clone());
            } else if let Some(node) = &node {
                nodes.push(node.clone());
            }
        }
        Self::from_nodes(nodes)
    }

    pub fn get_node<S: AsRef<str>>(&self, path: &[S]) -> Option<&TreeNode<V>> {
        let (head, rest) = path.split_first()?;
        let mut node = self.find(head.as_ref())?;
        for segment in rest {
            node = node.children.as_ref()?.find(segment.as_ref())?;
        }
        Some(&**node)
    }

    pub fn get<S: AsRef<str>>(&self, path: &[S]) -> Option<&V> {
        self.get_node(path)?.value()
    }

    pub fn contains<S: AsRef<str>>(&self, path: &[S]) -> bool {
        self.get(path).is_some()
    }

    /// Depth-first, pre-order walk over every node that holds a value.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            stack: self.nodes.iter().rev().map(|n| (0, &**n)).collect(),
            prefix: Vec::new(),
        }
    }
}

// =============================================================================
// Upsert
// =============================================================================

impl<V> Tree<V> {
    /// Returns a snapshot where `path` holds `value`.
    ///
    /// Missing segments are created, appended after their existing siblings.
    /// Replacing a value keeps the node's children. Only nodes along `path` are
    /// rebuilt; every other subtree is shared with `self`.
    ///
    /// Fails with [`TreeError::EmptyPath`] or [`TreeError::EmptySegment`],
    /// leaving `self` as it was.
    pub fn upsert<S: AsRef<str>>(&self, path: &[S], value: V) -> Result<Self> {
        let segments = match crate::path::to_segments(path) {
            Ok(segments) => segments,
            Err(err) => {
                debug!("rejecting upsert: {err}");
                return Err(err);
            }
        };
        trace!("upsert {segments:?}");
        Ok(self.upsert_segments(&segments, Arc::new(value)))
    }

    fn upsert_segments(&self, segments: &[Segment], value: Arc<V>) -> Self {
        match segments.split_first() {
            Some((head, rest)) => upsert_level(self, head, rest, value),
            None => self.clone(),
        }
    }
}

fn upsert_level<V>(level: &Tree<V>, head: &Segment, rest: &[Segment], value: Arc<V>) -> Tree<V> {
    let Some(idx) = level.position(head) else {
        let mut nodes = Vec::with_capacity(level.nodes.len() + 1);
        nodes.extend(level.nodes.iter().cloned());
        nodes.push(chain(head, rest, value));
        return Tree::from_nodes(nodes);
    };

    let node = &level.nodes[idx];
    let replacement = match rest.split_first() {
        None => node.rebuilt(Some(value), node.children.clone()),
        Some((next, rest)) => {
            let children = match &node.children {
                Some(children) => upsert_level(children, next, rest, value),
                None => Tree::from_nodes(vec![chain(next, rest, value)]),
            };
            node.rebuilt(node.value.clone(), Some(children))
        }
    };
    level.replace_at(idx, Some(replacement))
}

// =============================================================================
// Remove
// =============================================================================

impl<V> Tree<V> {
    /// Returns a snapshot without the value at `path`, pruning emptied
    /// ancestors. See [`Pruning::Cascade`].
    ///
    /// A leaf is deleted outright. A node with children only loses its value.
    /// A path that matches nothing, including an empty one, returns a tree
    /// sharing every node with `self`.
    pub fn remove<S: AsRef<str>>(&self, path: &[S]) -> Self {
        self.remove_with(path, Pruning::Cascade)
    }

    pub fn remove_with<S: AsRef<str>>(&self, path: &[S], pruning: Pruning) -> Self {
        let Some((head, rest)) = path.split_first() else {
            return self.clone();
        };
        trace!(
            "remove {:?} ({pruning:?})",
            path.iter().map(|s| s.as_ref()).collect::<Vec<&str>>()
        );
        match pruning {
            Pruning::Cascade => {
                remove_cascade(self, head.as_ref(), rest).unwrap_or_else(|| self.clone())
            }
            Pruning::LevelOnly => remove_level_only(self, head.as_ref(), rest),
        }
    }
}

/// `None` means nothing under `level` matched and the caller keeps its handle.
fn remove_cascade<V, S: AsRef<str>>(level: &Tree<V>, head: &str, rest: &[S]) -> Option<Tree<V>> {
    let idx = level.position(head)?;
    let node = &level.nodes[idx];
    let replacement = match rest.split_first() {
        None if node.is_leaf() => None,
        None if node.value.is_none() => return None,
        None => Some(node.rebuilt(None, node.children.clone())),
        Some((next, rest)) => {
            let children = remove_cascade(node.children.as_ref()?, next.as_ref(), rest)?;
            match (children.is_empty(), &node.value) {
                (false, value) => Some(node.rebuilt(value.clone(), Some(children))),
                (true, Some(value)) => Some(node.rebuilt(Some(value.clone()), None)),
                (true, None) => None,
            }
        }
    };
    Some(level.replace_at(idx, replacement))
}

fn remove_level_only<V, S: AsRef<str>>(level: &Tree<V>, head: &str, rest: &[S]) -> Tree<V> {
    if level.position(head).is_none() {
        return level.clone();
    }
    let nodes = level
        .nodes
        .iter()
        .filter(|n| !(&*n.key == head && n.is_leaf()))
        .map(|n| {
            if &*n.key != head {
                return n.clone();
            }
            match (rest.split_first(), &n.children) {
                (None, children) => n.rebuilt(None, children.clone()),
                (Some((next, rest)), Some(children)) => n.rebuilt(
                    n.value.clone(),
                    Some(remove_level_only(children, next.as_ref(), rest)),
                ),
                (Some(_), None) => n.clone(),
            }
        })
        .collect();
    Tree::from_nodes(nodes)
}

// =============================================================================
// Free functions
// =============================================================================

/// Same as [`Tree::upsert`].
pub fn upsert<V, S: AsRef<str>>(tree: &Tree<V>, path: &[S], value: V) -> Result<Tree<V>> {
    tree.upsert(path, value)
}

/// Same as [`Tree::remove`].
pub fn remove<V, S: AsRef<str>>(tree: &Tree<V>, path: &[S]) -> Tree<V> {
    tree.remove(path)
}

// =============================================================================
// Trait impls
// =============================================================================

impl<V> Default for Tree<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for Tree<V> {
    fn clone(&self) -> Self {
        Self {
            nodes: Arc::clone(&self.nodes),
        }
    }
}

impl<V: fmt::Debug> fmt::Debug for Tree<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.nodes.iter()).finish()
    }
}

impl<V> FromIterator<(Path, V)> for Tree<V> {
    fn from_iter<I: IntoIterator<Item = (Path, V)>>(iter: I) -> Self {
        let mut tree = Tree::new();
        tree.extend(iter);
        tree
    }
}

impl<V> Extend<(Path, V)> for Tree<V> {
    /// Replaces `self` with the snapshot after upserting every entry. Clones
    /// taken earlier are unaffected.
    fn extend<I: IntoIterator<Item = (Path, V)>>(&mut self, iter: I) {
        for (path, value) in iter {
            *self = self.upsert_segments(&path, Arc::new(value));
        }
    }
}

impl<'a, V> IntoIterator for &'a Tree<V> {
    type Item = (Path, &'a V);
    type IntoIter = Iter<'a, V>;

    fn into_iter(self) -> Iter<'a, V> {
        self.iter()
    }
}

// =============================================================================
// Iterator
// =============================================================================

pub struct Iter<'a, V> {
    /// Pending nodes with their depth.
    stack: Vec<(usize, &'a TreeNode<V>)>,
    /// Key chain of the last node visited.
    prefix: Vec<Segment>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (Path, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((depth, node)) = self.stack.pop() {
            self.prefix.truncate(depth);
            self.prefix.push(node.key.clone());
            if let Some(children) = &node.children {
                for child in children.nodes.iter().rev() {
                    self.stack.push((depth + 1, &**child));
                }
            }
            if let Some(value) = node.value.as_deref() {
                return Some((Path::from_raw(self.prefix.clone()), value));
            }
        }
        None
    }
}


#[cfg(test)]
mod proptests;
