/// Category hierarchy helpers
///
/// Categories form a shallow tree through `parent_id`. The whole table is
/// small, so the API loads `(id, parent_id, name)` triples once per request
/// and answers ancestry questions in memory.
///
/// # Example
///
/// ```
/// use storefront_shared::catalog::tree::{CategoryNode, CategoryTree};
/// use uuid::Uuid;
///
/// let root = Uuid::new_v4();
/// let child = Uuid::new_v4();
/// let tree = CategoryTree::new(vec![
///     CategoryNode { id: root, parent_id: None, name: "Electronics".into() },
///     CategoryNode { id: child, parent_id: Some(root), name: "Audio".into() },
/// ]);
///
/// assert_eq!(tree.full_name(child).as_deref(), Some("Electronics > Audio"));
/// assert_eq!(tree.level(child), 1);
/// assert!(tree.would_create_cycle(root, child));
/// ```

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

/// Separator used in breadcrumb names
pub const PATH_SEPARATOR: &str = " > ";

/// Minimal view of a category row
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct CategoryNode {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    pub name: String,
}

/// In-memory parent map
#[derive(Debug, Clone, Default)]
pub struct CategoryTree {
    nodes: HashMap<Uuid, CategoryNode>,
}

impl CategoryTree {
    pub fn new(nodes: Vec<CategoryNode>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.id, n)).collect(),
        }
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.nodes.contains_key(&id)
    }

    /// IDs from `id` up to its root, starting with `id`
    ///
    /// Stops early if stored data already contains a loop.
    pub fn ancestry(&self, id: Uuid) -> Vec<Uuid> {
        let mut path = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(node_id) = current {
            if !seen.insert(node_id) {
                break;
            }
            let Some(node) = self.nodes.get(&node_id) else {
                break;
            };
            path.push(node_id);
            current = node.parent_id;
        }

        path
    }

    /// Depth below the root (roots are level 0)
    pub fn level(&self, id: Uuid) -> usize {
        self.ancestry(id).len().saturating_sub(1)
    }

    /// Breadcrumb name, e.g. `"Electronics > Audio > Headphones"`
    pub fn full_name(&self, id: Uuid) -> Option<String> {
        let path = self.ancestry(id);
        if path.is_empty() {
            return None;
        }

        let names: Vec<&str> = path
            .iter()
            .rev()
            .filter_map(|id| self.nodes.get(id).map(|n| n.name.as_str()))
            .collect();

        Some(names.join(PATH_SEPARATOR))
    }

    /// Whether re-parenting `id` under `new_parent` would make it its own ancestor
    pub fn would_create_cycle(&self, id: Uuid, new_parent: Uuid) -> bool {
        id == new_parent || self.ancestry(new_parent).contains(&id)
    }

    /// Direct children of `id`
    pub fn children(&self, id: Uuid) -> Vec<Uuid> {
        self.nodes
            .values()
            .filter(|n| n.parent_id == Some(id))
            .map(|n| n.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: Uuid, parent_id: Option<Uuid>, name: &str) -> CategoryNode {
        CategoryNode {
            id,
            parent_id,
            name: name.to_string(),
        }
    }

    struct Fixture {
        tree: CategoryTree,
        root: Uuid,
        mid: Uuid,
        leaf: Uuid,
        other: Uuid,
    }

    fn fixture() -> Fixture {
        let (root, mid, leaf, other) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let tree = CategoryTree::new(vec![
            node(root, None, "Electronics"),
            node(mid, Some(root), "Audio"),
            node(leaf, Some(mid), "Headphones"),
            node(other, None, "Books"),
        ]);
        Fixture { tree, root, mid, leaf, other }
    }

    #[test]
    fn test_level_and_full_name() {
        let f = fixture();

        assert_eq!(f.tree.level(f.root), 0);
        assert_eq!(f.tree.level(f.leaf), 2);
        assert_eq!(
            f.tree.full_name(f.leaf).as_deref(),
            Some("Electronics > Audio > Headphones")
        );
        assert_eq!(f.tree.full_name(f.other).as_deref(), Some("Books"));
        assert_eq!(f.tree.full_name(Uuid::new_v4()), None);
    }

    #[test]
    fn test_would_create_cycle() {
        let f = fixture();

        assert!(f.tree.would_create_cycle(f.root, f.root));
        assert!(f.tree.would_create_cycle(f.root, f.leaf));
        assert!(f.tree.would_create_cycle(f.mid, f.leaf));
        assert!(!f.tree.would_create_cycle(f.leaf, f.other));
        assert!(!f.tree.would_create_cycle(f.other, f.leaf));
    }

    #[test]
    fn test_ancestry_survives_existing_loop() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let tree = CategoryTree::new(vec![node(a, Some(b), "A"), node(b, Some(a), "B")]);

        assert_eq!(tree.ancestry(a), vec![a, b]);
        assert_eq!(tree.level(a), 1);
    }

    #[test]
    fn test_children() {
        let f = fixture();
        assert_eq!(f.tree.children(f.root), vec![f.mid]);
        assert!(f.tree.children(f.leaf).is_empty());
        assert!(f.tree.contains(f.other));
    }
}
