//! Dominator tree over a function's placed blocks.
//!
//! A block `d` **dominates** a block `n` if every path from the entry to `n`
//! passes through `d`. The verifier uses this to check that every value is
//! defined before it can be read, and the weak-mutation instrumentation uses
//! it to decide where comparisons may be materialised.
//!
//! # Algorithm
//!
//! The iterative data-flow formulation of Cooper, Harvey and Kennedy, run over
//! a reverse post-order of the blocks reachable from the entry. Unreachable
//! blocks have no dominator information; [`DominatorTree::is_reachable`] tells
//! them apart.

use std::collections::HashMap;

use crate::ir::{BlockId, Function};

/// Immediate-dominator table for one function.
#[derive(Debug, Clone)]
pub struct DominatorTree {
    entry: Option<BlockId>,
    /// Immediate dominator per reachable block; the entry maps to itself.
    idom: HashMap<BlockId, BlockId>,
    /// Reverse post-order index per reachable block.
    order: HashMap<BlockId, usize>,
}

impl DominatorTree {
    /// Computes the dominator tree of `function`.
    #[must_use]
    pub fn compute(function: &Function) -> Self {
        let Some(entry) = function.entry() else {
            return Self {
                entry: None,
                idom: HashMap::new(),
                order: HashMap::new(),
            };
        };

        let rpo = reverse_post_order(function, entry);
        let order: HashMap<BlockId, usize> =
            rpo.iter().enumerate().map(|(i, &b)| (b, i)).collect();
        let preds = function.predecessors();

        let mut idom: HashMap<BlockId, BlockId> = HashMap::new();
        idom.insert(entry, entry);

        let mut changed = true;
        while changed {
            changed = false;
            for &block in rpo.iter().skip(1) {
                let mut new_idom: Option<BlockId> = None;
                for pred in preds.get(&block).map(Vec::as_slice).unwrap_or_default() {
                    if !idom.contains_key(pred) {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => *pred,
                        Some(current) => intersect(&idom, &order, *pred, current),
                    });
                }
                if let Some(new_idom) = new_idom {
                    if idom.get(&block) != Some(&new_idom) {
                        idom.insert(block, new_idom);
                        changed = true;
                    }
                }
            }
        }

        Self {
            entry: Some(entry),
            idom,
            order,
        }
    }

    /// Returns `true` if `block` is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: BlockId) -> bool {
        self.idom.contains_key(&block)
    }

    /// Returns the immediate dominator of `block`, or `None` for the entry and
    /// for unreachable blocks.
    #[must_use]
    pub fn immediate_dominator(&self, block: BlockId) -> Option<BlockId> {
        if Some(block) == self.entry {
            return None;
        }
        self.idom.get(&block).copied()
    }

    /// Checks if `a` dominates `b`. A block dominates itself.
    ///
    /// Returns `false` when either block is unreachable.
    #[must_use]
    pub fn dominates(&self, a: BlockId, b: BlockId) -> bool {
        if !self.is_reachable(a) || !self.is_reachable(b) {
            return false;
        }
        let mut current = b;
        loop {
            if current == a {
                return true;
            }
            match self.immediate_dominator(current) {
                Some(parent) => current = parent,
                None => return false,
            }
        }
    }

    /// Returns the reachable blocks in reverse post-order.
    #[must_use]
    pub fn reverse_post_order(&self) -> Vec<BlockId> {
        let mut blocks: Vec<(usize, BlockId)> =
            self.order.iter().map(|(&b, &i)| (i, b)).collect();
        blocks.sort_unstable();
        blocks.into_iter().map(|(_, b)| b).collect()
    }
}

fn intersect(
    idom: &HashMap<BlockId, BlockId>,
    order: &HashMap<BlockId, usize>,
    mut a: BlockId,
    mut b: BlockId,
) -> BlockId {
    while a != b {
        while order[&a] > order[&b] {
            a = idom[&a];
        }
        while order[&b] > order[&a] {
            b = idom[&b];
        }
    }
    a
}

/// Depth-first post-order from `entry`, reversed.
fn reverse_post_order(function: &Function, entry: BlockId) -> Vec<BlockId> {
    let mut visited = std::collections::HashSet::new();
    let mut post = Vec::new();
    // (block, next successor index)
    let mut stack: Vec<(BlockId, usize)> = vec![(entry, 0)];
    visited.insert(entry);

    while let Some((block, next)) = stack.pop() {
        let succs = function.successors(block);
        if next < succs.len() {
            stack.push((block, next + 1));
            let succ = succs[next];
            if function.is_placed(succ) && visited.insert(succ) {
                stack.push((succ, 0));
            }
        } else {
            post.push(block);
        }
    }

    post.reverse();
    post
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Operand, Type};

    #[test]
    fn test_diamond_dominance() {
        let mut b = FunctionBuilder::new("d", vec![Type::I1], Type::Void);
        let entry = b.block("entry");
        let left = b.declare_block("left");
        let right = b.declare_block("right");
        let join = b.declare_block("join");
        let dead = b.declare_block("dead");
        b.cond_br(Operand::Arg(0), left, right);
        b.switch_to(left);
        b.br(join);
        b.switch_to(right);
        b.br(join);
        b.switch_to(join);
        b.ret(None);
        b.switch_to(dead);
        b.br(join);
        let f = b.finish();

        let dom = DominatorTree::compute(&f);
        assert!(dom.dominates(entry, join));
        assert!(!dom.dominates(left, join));
        assert_eq!(dom.immediate_dominator(join), Some(entry));
        assert_eq!(dom.immediate_dominator(entry), None);
        assert!(!dom.is_reachable(dead));
        assert!(!dom.dominates(dead, join));
        assert_eq!(dom.reverse_post_order()[0], entry);
    }
}
