//! Navigation tree builder.
//!
//! Assembles a user's flat category and document lists into the nested forest
//! shown in the sidebar. Construction and traversal use explicit stacks, so
//! arbitrarily deep hierarchies never exhaust the call stack.
//!
//! Rules:
//! - A category without a parent is a root.
//! - A category whose parent is not in the input is dropped, along with its subtree.
//! - A document whose category is not in the input is dropped.
//! - A document without a category is a root leaf, placed after the root categories.
//! - Within a category, child categories come before documents.
//! - Sibling order follows input order (callers sort categories by path and
//!   documents by recency).
//! - A category on a parent cycle has no root ancestor and is absent.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Category, Document};

/// A node of the navigation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    Category {
        category: Category,
        children: Vec<TreeNode>,
    },
    Document {
        document: Document,
    },
}

impl TreeNode {
    pub fn id(&self) -> Uuid {
        match self {
            TreeNode::Category { category, .. } => category.id,
            TreeNode::Document { document } => document.id,
        }
    }

    /// Display name: category name or document title.
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Category { category, .. } => &category.name,
            TreeNode::Document { document } => document.display_title(),
        }
    }

    /// Ordered children; `None` for documents.
    pub fn children(&self) -> Option<&[TreeNode]> {
        match self {
            TreeNode::Category { children, .. } => Some(children),
            TreeNode::Document { .. } => None,
        }
    }

    pub fn is_category(&self) -> bool {
        matches!(self, TreeNode::Category { .. })
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            TreeNode::Document { document } => Some(document),
            TreeNode::Category { .. } => None,
        }
    }
}

/// Build the navigation forest from flat category and document lists.
pub fn build_tree(categories: &[Category], documents: &[Document]) -> Vec<TreeNode> {
    // First occurrence wins for duplicate ids.
    let mut index: HashMap<Uuid, usize> = HashMap::with_capacity(categories.len());
    for (i, cat) in categories.iter().enumerate() {
        index.entry(cat.id).or_insert(i);
    }

    let mut roots: Vec<usize> = Vec::new();
    let mut child_categories: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, cat) in categories.iter().enumerate() {
        if index.get(&cat.id) != Some(&i) {
            continue;
        }
        match cat.parent_id {
            None => roots.push(i),
            Some(parent_id) => {
                if let Some(&parent) = index.get(&parent_id) {
                    child_categories.entry(parent).or_default().push(i);
                }
            }
        }
    }

    let mut root_documents: Vec<&Document> = Vec::new();
    let mut child_documents: HashMap<usize, Vec<&Document>> = HashMap::new();
    for doc in documents {
        match doc.category_id {
            None => root_documents.push(doc),
            Some(category_id) => {
                if let Some(&cat) = index.get(&category_id) {
                    child_documents.entry(cat).or_default().push(doc);
                }
            }
        }
    }

    // Pre-order walk from the roots; only reachable categories are visited.
    let mut order: Vec<usize> = Vec::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut stack: Vec<usize> = roots.iter().rev().copied().collect();
    while let Some(i) = stack.pop() {
        if !visited.insert(i) {
            continue;
        }
        order.push(i);
        if let Some(kids) = child_categories.get(&i) {
            stack.extend(kids.iter().rev().copied());
        }
    }

    // Assemble in reverse pre-order so every child is complete before its parent.
    let mut built: Vec<Option<TreeNode>> = vec![None; categories.len()];
    for &i in order.iter().rev() {
        let mut children: Vec<TreeNode> = Vec::new();
        if let Some(kids) = child_categories.get(&i) {
            children.extend(kids.iter().filter_map(|&k| built[k].take()));
        }
        if let Some(docs) = child_documents.get(&i) {
            children.extend(docs.iter().map(|&d| TreeNode::Document {
                document: d.clone(),
            }));
        }
        built[i] = Some(TreeNode::Category {
            category: categories[i].clone(),
            children,
        });
    }

    let mut forest: Vec<TreeNode> = roots.iter().filter_map(|&r| built[r].take()).collect();
    forest.extend(root_documents.into_iter().map(|d| TreeNode::Document {
        document: d.clone(),
    }));

    tracing::trace!(
        categories = categories.len(),
        documents = documents.len(),
        node_count = count_nodes(&forest),
        "Built navigation tree"
    );
    forest
}

/// Depth-first pre-order iterator yielding `(depth, node)`.
pub struct DepthFirst<'a> {
    stack: Vec<(usize, &'a TreeNode)>,
}

impl<'a> Iterator for DepthFirst<'a> {
    type Item = (usize, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        if let Some(children) = node.children() {
            self.stack
                .extend(children.iter().rev().map(|c| (depth + 1, c)));
        }
        Some((depth, node))
    }
}

/// Walk a forest depth-first, roots at depth 0.
pub fn walk(nodes: &[TreeNode]) -> DepthFirst<'_> {
    DepthFirst {
        stack: nodes.iter().rev().map(|n| (0, n)).collect(),
    }
}

/// Total number of nodes in a forest.
pub fn count_nodes(nodes: &[TreeNode]) -> usize {
    walk(nodes).count()
}

/// Find a node by id.
pub fn find<'a>(nodes: &'a [TreeNode], id: Uuid) -> Option<&'a TreeNode> {
    walk(nodes).map(|(_, n)| n).find(|n| n.id() == id)
}

/// One row of the sidebar as rendered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeRow<'a> {
    pub depth: usize,
    pub node: &'a TreeNode,
    /// Only meaningful for categories.
    pub expanded: bool,
}

/// Flatten a forest into visible rows; children of collapsed categories are hidden.
pub fn visible_rows<'a>(nodes: &'a [TreeNode], expanded: &HashSet<Uuid>) -> Vec<TreeRow<'a>> {
    let mut rows = Vec::new();
    let mut stack: Vec<(usize, &TreeNode)> = nodes.iter().rev().map(|n| (0, n)).collect();
    while let Some((depth, node)) = stack.pop() {
        let is_open = node.is_category() && expanded.contains(&node.id());
        rows.push(TreeRow {
            depth,
            node,
            expanded: is_open,
        });
        if is_open {
            if let Some(children) = node.children() {
                stack.extend(children.iter().rev().map(|c| (depth + 1, c)));
            }
        }
    }
    rows
}

/// Entry of a "parent category" picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryOption {
    pub id: Uuid,
    pub depth: usize,
    /// Name indented with two spaces per level.
    pub label: String,
}

/// Picker options for every reachable category, in tree order.
pub fn category_options(categories: &[Category]) -> Vec<CategoryOption> {
    let tree = build_tree(categories, &[]);
    walk(&tree)
        .filter(|(_, node)| node.is_category())
        .map(|(depth, node)| CategoryOption {
            id: node.id(),
            depth,
            label: format!("{}{}", "  ".repeat(depth), node.name()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn cat(name: &str, parent: Option<Uuid>) -> Category {
        Category {
            id: Uuid::new_v4(),
            name: name.to_string(),
            parent_id: parent,
            user_id: Uuid::nil(),
            path: name.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn doc(title: &str, category: Option<Uuid>) -> Document {
        Document {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: String::new(),
            user_id: Uuid::nil(),
            category_id: category,
            is_public: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ids(nodes: &[TreeNode]) -> Vec<Uuid> {
        walk(nodes).map(|(_, n)| n.id()).collect()
    }

    #[test]
    fn test_nested_category_with_document() {
        let a = cat("A", None);
        let b = cat("B", Some(a.id));
        let d1 = doc("d1", Some(b.id));

        let tree = build_tree(&[a.clone(), b.clone()], &[d1.clone()]);

        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].id(), a.id);
        let a_children = tree[0].children().unwrap();
        assert_eq!(a_children.len(), 1);
        assert_eq!(a_children[0].id(), b.id);
        let b_children = a_children[0].children().unwrap();
        assert_eq!(b_children.len(), 1);
        assert_eq!(b_children[0].id(), d1.id);
        assert!(b_children[0].children().is_none());
    }

    #[test]
    fn test_empty_input() {
        assert!(build_tree(&[], &[]).is_empty());
    }

    #[test]
    fn test_orphans_are_dropped() {
        let a = cat("A", None);
        let orphan = cat("orphan", Some(Uuid::new_v4()));
        let orphan_child = cat("orphan-child", Some(orphan.id));
        let lost = doc("lost", Some(Uuid::new_v4()));
        let under_orphan = doc("under-orphan", Some(orphan.id));

        let tree = build_tree(&[a.clone(), orphan, orphan_child], &[lost, under_orphan]);

        assert_eq!(ids(&tree), vec![a.id]);
    }

    #[test]
    fn test_root_documents_follow_root_categories() {
        let loose = doc("loose", None);
        let a = cat("A", None);
        let b = cat("B", None);

        let tree = build_tree(&[a.clone(), b.clone()], &[loose.clone()]);

        let roots: Vec<Uuid> = tree.iter().map(TreeNode::id).collect();
        assert_eq!(roots, vec![a.id, b.id, loose.id]);
    }

    #[test]
    fn test_sibling_order_follows_input() {
        let a = cat("A", None);
        let z = cat("z", Some(a.id));
        let m = cat("m", Some(a.id));
        let newer = doc("newer", Some(a.id));
        let older = doc("older", Some(a.id));

        let tree = build_tree(&[a.clone(), z.clone(), m.clone()], &[newer.clone(), older.clone()]);

        let children: Vec<Uuid> = tree[0].children().unwrap().iter().map(TreeNode::id).collect();
        assert_eq!(children, vec![z.id, m.id, newer.id, older.id]);
    }

    #[test]
    fn test_every_reachable_record_appears_exactly_once() {
        let a = cat("A", None);
        let b = cat("B", Some(a.id));
        let c = cat("C", Some(b.id));
        let d = cat("D", None);
        let docs = vec![
            doc("1", Some(a.id)),
            doc("2", Some(c.id)),
            doc("3", None),
            doc("4", Some(d.id)),
        ];
        let cats = vec![a, b, c, d];

        let tree = build_tree(&cats, &docs);
        let mut seen = ids(&tree);
        let total = seen.len();
        seen.sort();
        seen.dedup();

        assert_eq!(seen.len(), total);
        assert_eq!(total, cats.len() + docs.len());
    }

    #[test]
    fn test_build_is_idempotent() {
        let a = cat("A", None);
        let b = cat("B", Some(a.id));
        let cats = vec![a.clone(), b.clone()];
        let docs = vec![doc("x", Some(b.id)), doc("y", None)];

        assert_eq!(build_tree(&cats, &docs), build_tree(&cats, &docs));
    }

    #[test]
    fn test_cycle_is_absent() {
        let mut x = cat("x", None);
        let mut y = cat("y", None);
        x.parent_id = Some(y.id);
        y.parent_id = Some(x.id);
        let mut selfish = cat("self", None);
        selfish.parent_id = Some(selfish.id);
        let root = cat("root", None);
        let in_cycle = doc("in-cycle", Some(x.id));

        let tree = build_tree(&[x, y, selfish, root.clone()], &[in_cycle]);

        assert_eq!(ids(&tree), vec![root.id]);
    }

    #[test]
    fn test_deep_chain_builds_without_recursion() {
        let mut cats = vec![cat("0", None)];
        for i in 1..1000 {
            let parent = cats[i - 1].id;
            cats.push(cat(&i.to_string(), Some(parent)));
        }

        let tree = build_tree(&cats, &[]);

        let max_depth = walk(&tree).map(|(depth, _)| depth).max();
        assert_eq!(max_depth, Some(999));
        assert_eq!(count_nodes(&tree), 1000);
    }

    #[test]
    fn test_visible_rows_respect_expansion() {
        let a = cat("A", None);
        let b = cat("B", Some(a.id));
        let d = doc("d", Some(b.id));
        let tree = build_tree(&[a.clone(), b.clone()], &[d.clone()]);

        let collapsed = visible_rows(&tree, &HashSet::new());
        assert_eq!(collapsed.len(), 1);
        assert!(!collapsed[0].expanded);

        let open: HashSet<Uuid> = [a.id, b.id].into_iter().collect();
        let rows = visible_rows(&tree, &open);
        let shape: Vec<(usize, Uuid)> = rows.iter().map(|r| (r.depth, r.node.id())).collect();
        assert_eq!(shape, vec![(0, a.id), (1, b.id), (2, d.id)]);
    }

    #[test]
    fn test_category_options_are_indented() {
        let a = cat("work", None);
        let b = cat("projects", Some(a.id));
        let c = cat("home", None);

        let options = category_options(&[a.clone(), b.clone(), c.clone()]);
        let labels: Vec<&str> = options.iter().map(|o| o.label.as_str()).collect();

        assert_eq!(labels, vec!["work", "  projects", "home"]);
        assert_eq!(options[1].id, b.id);
        assert_eq!(options[1].depth, 1);
    }

    #[test]
    fn test_find_and_name() {
        let a = cat("A", None);
        let untitled = doc("  ", Some(a.id));
        let tree = build_tree(&[a.clone()], &[untitled.clone()]);

        let node = find(&tree, untitled.id).unwrap();
        assert_eq!(node.name(), "Untitled");
        assert_eq!(node.as_document().map(|d| d.id), Some(untitled.id));
        assert!(find(&tree, Uuid::new_v4()).is_none());
    }
}
