//! Dynamic AABB tree for broad-phase pair finding and spatial queries.
//!
//! Leaves carry an optionally fattened box so that small movements do not
//! force a reinsert every step.

use std::collections::BTreeMap;

use crate::math::{Real, Vect, BB};

const NULL: usize = usize::MAX;

#[derive(Debug, Clone)]
enum NodeKind<T> {
    Leaf(T),
    Branch(usize, usize),
    Free,
}

#[derive(Debug, Clone)]
struct Node<T> {
    bb: BB,
    parent: usize,
    kind: NodeKind<T>,
}

struct Ray {
    a: Vect,
    b: Vect,
    radius: Real,
}

impl Ray {
    fn enter(&self, bb: &BB) -> Real {
        if self.radius > 0.0 {
            bb.inflate(self.radius).segment_query(self.a, self.b)
        } else {
            bb.segment_query(self.a, self.b)
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BbTree<T> {
    nodes: Vec<Node<T>>,
    free: Vec<usize>,
    root: usize,
    leaves: BTreeMap<T, usize>,
    /// Leaf boxes grow by this fraction of their largest side.
    fatten: Real,
}

impl<T: Copy + Ord> BbTree<T> {
    pub fn new(fatten: Real) -> Self {
        Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: NULL,
            leaves: BTreeMap::new(),
            fatten,
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn contains(&self, key: T) -> bool {
        self.leaves.contains_key(&key)
    }

    /// Stored (possibly fattened) box of a leaf.
    #[cfg(test)]
    pub fn leaf_bb(&self, key: T) -> Option<BB> {
        self.leaves.get(&key).map(|&n| self.nodes[n].bb)
    }

    pub fn insert(&mut self, key: T, bb: BB) {
        if self.contains(key) {
            self.update(key, bb);
            return;
        }
        let leaf = self.alloc(Node {
            bb: self.fat(bb),
            parent: NULL,
            kind: NodeKind::Leaf(key),
        });
        self.leaves.insert(key, leaf);
        self.insert_leaf(leaf);
    }

    pub fn remove(&mut self, key: T) -> bool {
        match self.leaves.remove(&key) {
            Some(leaf) => {
                self.remove_leaf(leaf);
                self.release(leaf);
                true
            }
            None => false,
        }
    }

    /// Move a leaf to `bb`. Returns true when the leaf had to be reinserted.
    pub fn update(&mut self, key: T, bb: BB) -> bool {
        let Some(&leaf) = self.leaves.get(&key) else {
            return false;
        };
        if self.nodes[leaf].bb.contains_bb(&bb) {
            return false;
        }
        self.remove_leaf(leaf);
        self.nodes[leaf].bb = self.fat(bb);
        self.insert_leaf(leaf);
        true
    }

    /// Call `f` for every leaf whose box overlaps `bb`.
    pub fn query(&self, bb: &BB, mut f: impl FnMut(T)) {
        if self.root == NULL {
            return;
        }
        let mut stack = vec![self.root];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if !node.bb.intersects(bb) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(key) => f(key),
                NodeKind::Branch(a, b) => {
                    stack.push(b);
                    stack.push(a);
                }
                NodeKind::Free => {}
            }
        }
    }

    /// Visit leaves crossed by a segment of thickness `radius` from `a` to
    /// `b`, nearest boxes first. `f` returns the fraction at which the
    /// search may stop; subtrees entered beyond it are skipped.
    pub fn segment_query(&self, a: Vect, b: Vect, radius: Real, t_exit: Real, mut f: impl FnMut(T) -> Real) {
        if self.root == NULL {
            return;
        }
        let ray = Ray { a, b, radius };
        if ray.enter(&self.nodes[self.root].bb) < t_exit {
            self.subtree_segment_query(self.root, &ray, t_exit, &mut f);
        }
    }

    fn subtree_segment_query<F: FnMut(T) -> Real>(&self, index: usize, ray: &Ray, mut t_exit: Real, f: &mut F) -> Real {
        match self.nodes[index].kind {
            NodeKind::Leaf(key) => f(key),
            NodeKind::Branch(c1, c2) => {
                let t1 = ray.enter(&self.nodes[c1].bb);
                let t2 = ray.enter(&self.nodes[c2].bb);
                let (first, t_first, second, t_second) = if t1 < t2 { (c1, t1, c2, t2) } else { (c2, t2, c1, t1) };
                if t_first < t_exit {
                    t_exit = t_exit.min(self.subtree_segment_query(first, ray, t_exit, f));
                }
                if t_second < t_exit {
                    t_exit = t_exit.min(self.subtree_segment_query(second, ray, t_exit, f));
                }
                t_exit
            }
            NodeKind::Free => t_exit,
        }
    }

    fn fat(&self, bb: BB) -> BB {
        if self.fatten > 0.0 {
            bb.inflate(self.fatten * bb.width().max(bb.height()))
        } else {
            bb
        }
    }

    fn alloc(&mut self, node: Node<T>) -> usize {
        match self.free.pop() {
            Some(index) => {
                self.nodes[index] = node;
                index
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn release(&mut self, index: usize) {
        self.nodes[index].kind = NodeKind::Free;
        self.nodes[index].parent = NULL;
        self.free.push(index);
    }

    fn insert_leaf(&mut self, leaf: usize) {
        if self.root == NULL {
            self.root = leaf;
            self.nodes[leaf].parent = NULL;
            return;
        }

        // Descend toward the child whose growth costs the least.
        let leaf_bb = self.nodes[leaf].bb;
        let mut sibling = self.root;
        while let NodeKind::Branch(a, b) = self.nodes[sibling].kind {
            let bb_a = self.nodes[a].bb;
            let bb_b = self.nodes[b].bb;
            let cost_a = bb_b.area() + bb_a.merged_area(&leaf_bb);
            let cost_b = bb_a.area() + bb_b.merged_area(&leaf_bb);
            sibling = if cost_b < cost_a { b } else { a };
        }

        let old_parent = self.nodes[sibling].parent;
        let branch = self.alloc(Node {
            bb: self.nodes[sibling].bb.merge(&leaf_bb),
            parent: old_parent,
            kind: NodeKind::Branch(sibling, leaf),
        });
        self.nodes[sibling].parent = branch;
        self.nodes[leaf].parent = branch;

        if old_parent == NULL {
            self.root = branch;
        } else {
            self.replace_child(old_parent, sibling, branch);
            self.refit(old_parent);
        }
    }

    fn remove_leaf(&mut self, leaf: usize) {
        if leaf == self.root {
            self.root = NULL;
            return;
        }

        let parent = self.nodes[leaf].parent;
        let sibling = match self.nodes[parent].kind {
            NodeKind::Branch(a, b) if a == leaf => b,
            NodeKind::Branch(a, _) => a,
            _ => return,
        };
        let grandparent = self.nodes[parent].parent;

        if grandparent == NULL {
            self.root = sibling;
            self.nodes[sibling].parent = NULL;
        } else {
            self.replace_child(grandparent, parent, sibling);
            self.nodes[sibling].parent = grandparent;
            self.refit(grandparent);
        }
        self.nodes[leaf].parent = NULL;
        self.release(parent);
    }

    fn replace_child(&mut self, parent: usize, old: usize, new: usize) {
        if let NodeKind::Branch(a, b) = &mut self.nodes[parent].kind {
            if *a == old {
                *a = new;
            } else if *b == old {
                *b = new;
            }
        }
    }

    fn refit(&mut self, mut index: usize) {
        while index != NULL {
            if let NodeKind::Branch(a, b) = self.nodes[index].kind {
                self.nodes[index].bb = self.nodes[a].bb.merge(&self.nodes[b].bb);
            }
            index = self.nodes[index].parent;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box(x: Real, y: Real) -> BB {
        BB::for_extents(Vect::new(x, y), 0.5, 0.5)
    }

    fn collect(tree: &BbTree<u32>, bb: BB) -> Vec<u32> {
        let mut hits = Vec::new();
        tree.query(&bb, |k| hits.push(k));
        hits.sort();
        hits
    }

    #[test]
    fn query_finds_overlapping_leaves() {
        let mut tree = BbTree::new(0.0);
        for i in 0..10u32 {
            tree.insert(i, unit_box(i as Real * 2.0, 0.0));
        }
        assert_eq!(tree.len(), 10);
        assert_eq!(collect(&tree, BB::new(3.8, -1.0, 6.2, 1.0)), vec![2, 3]);
        assert!(collect(&tree, BB::new(100.0, 100.0, 101.0, 101.0)).is_empty());
    }

    #[test]
    fn remove_keeps_tree_consistent() {
        let mut tree = BbTree::new(0.0);
        for i in 0..6u32 {
            tree.insert(i, unit_box(i as Real, 0.0));
        }
        assert!(tree.remove(3));
        assert!(!tree.remove(3));
        assert_eq!(tree.len(), 5);
        assert_eq!(collect(&tree, BB::new(-10.0, -10.0, 10.0, 10.0)), vec![0, 1, 2, 4, 5]);

        for i in [0u32, 1, 2, 4, 5] {
            tree.remove(i);
        }
        assert_eq!(tree.len(), 0);
        assert!(collect(&tree, BB::new(-10.0, -10.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn update_moves_leaf() {
        let mut tree = BbTree::new(0.1);
        tree.insert(1u32, unit_box(0.0, 0.0));
        tree.insert(2u32, unit_box(10.0, 0.0));

        // Small moves stay inside the fattened box.
        assert!(!tree.update(1, unit_box(0.05, 0.0)));
        assert!(tree.update(1, unit_box(20.0, 0.0)));
        assert_eq!(collect(&tree, unit_box(20.0, 0.0)), vec![1]);
        assert!(collect(&tree, unit_box(0.0, 0.0)).is_empty());
        assert!(tree.leaf_bb(1).unwrap().contains_bb(&unit_box(20.0, 0.0)));
    }

    #[test]
    fn segment_query_visits_in_order_and_stops_early() {
        let mut tree = BbTree::new(0.0);
        for i in 0..5u32 {
            tree.insert(i, unit_box(i as Real * 3.0, 0.0));
        }
        let a = Vect::new(-5.0, 0.0);
        let b = Vect::new(15.0, 0.0);

        let mut all = Vec::new();
        tree.segment_query(a, b, 0.0, 1.0, |k| {
            all.push(k);
            1.0
        });
        all.sort();
        assert_eq!(all, vec![0, 1, 2, 3, 4]);

        // Report a hit on the first box; later boxes lie beyond it.
        let mut visited = Vec::new();
        tree.segment_query(a, b, 0.0, 1.0, |k| {
            visited.push(k);
            if k == 0 {
                0.25
            } else {
                1.0
            }
        });
        assert!(visited.contains(&0));
        assert!(!visited.contains(&4), "visited {:?}", visited);
    }
}
