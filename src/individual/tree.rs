//! # Expression Trees
//!
//! Genetic-programming individuals carry an [`ExpressionTree`]. Nodes are addressed in
//! preorder (the root is index 0), which is how crossover and mutation pick the subtree
//! they operate on.
//!
//! ```rust
//! use heuropt::individual::tree::{BinaryOperator, ExpressionTree, Node};
//!
//! let tree = ExpressionTree::new(Node::binary(
//!     BinaryOperator::Add,
//!     Node::Variable(0),
//!     Node::Constant(2.0),
//! ));
//! assert_eq!(tree.size(), 3);
//! assert_eq!(tree.evaluate(&[3.0]), 5.0);
//! assert_eq!(tree.to_string(), "(x0 + 2)");
//! ```

use std::fmt;

use crate::error::{OptimizationError, Result};
use crate::rng::RandomNumberGenerator;

/// Operators taking a single argument.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Neg,
    Sin,
    Cos,
    /// Exponential, with the argument clamped to avoid overflow.
    Exp,
    /// Protected logarithm, `ln(|x|)` and `0` at zero.
    Log,
    /// Protected square root, `sqrt(|x|)`.
    Sqrt,
}

impl UnaryOperator {
    fn apply(self, x: f64) -> f64 {
        match self {
            UnaryOperator::Neg => -x,
            UnaryOperator::Sin => x.sin(),
            UnaryOperator::Cos => x.cos(),
            UnaryOperator::Exp => x.min(700.0).exp(),
            UnaryOperator::Log => {
                if x == 0.0 {
                    0.0
                } else {
                    x.abs().ln()
                }
            }
            UnaryOperator::Sqrt => x.abs().sqrt(),
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Neg => "-",
            UnaryOperator::Sin => "sin",
            UnaryOperator::Cos => "cos",
            UnaryOperator::Exp => "exp",
            UnaryOperator::Log => "log",
            UnaryOperator::Sqrt => "sqrt",
        }
    }
}

/// Operators taking two arguments.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Sub,
    Mul,
    /// Protected division, `1` when the divisor is zero.
    Div,
}

impl BinaryOperator {
    fn apply(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOperator::Add => a + b,
            BinaryOperator::Sub => a - b,
            BinaryOperator::Mul => a * b,
            BinaryOperator::Div => {
                if b == 0.0 {
                    1.0
                } else {
                    a / b
                }
            }
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Sub => "-",
            BinaryOperator::Mul => "*",
            BinaryOperator::Div => "/",
        }
    }
}

/// A node of an expression tree.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Constant(f64),
    Variable(usize),
    Unary(UnaryOperator, Box<Node>),
    Binary(BinaryOperator, Box<Node>, Box<Node>),
}

impl Node {
    pub fn unary(op: UnaryOperator, child: Node) -> Self {
        Node::Unary(op, Box::new(child))
    }

    pub fn binary(op: BinaryOperator, left: Node, right: Node) -> Self {
        Node::Binary(op, Box::new(left), Box::new(right))
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        match self {
            Node::Constant(_) | Node::Variable(_) => 1,
            Node::Unary(_, child) => 1 + child.size(),
            Node::Binary(_, left, right) => 1 + left.size() + right.size(),
        }
    }

    /// Depth of this subtree; a terminal has depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Node::Constant(_) | Node::Variable(_) => 0,
            Node::Unary(_, child) => 1 + child.depth(),
            Node::Binary(_, left, right) => 1 + left.depth().max(right.depth()),
        }
    }

    pub fn evaluate(&self, inputs: &[f64]) -> f64 {
        match self {
            Node::Constant(c) => *c,
            Node::Variable(i) => inputs.get(*i).copied().unwrap_or(0.0),
            Node::Unary(op, child) => op.apply(child.evaluate(inputs)),
            Node::Binary(op, left, right) => {
                op.apply(left.evaluate(inputs), right.evaluate(inputs))
            }
        }
    }

    fn node_at(&self, index: usize) -> Option<&Node> {
        if index == 0 {
            return Some(self);
        }
        match self {
            Node::Constant(_) | Node::Variable(_) => None,
            Node::Unary(_, child) => child.node_at(index - 1),
            Node::Binary(_, left, right) => {
                let left_size = left.size();
                if index <= left_size {
                    left.node_at(index - 1)
                } else {
                    right.node_at(index - 1 - left_size)
                }
            }
        }
    }

    fn node_at_mut(&mut self, index: usize) -> Option<&mut Node> {
        if index == 0 {
            return Some(self);
        }
        match self {
            Node::Constant(_) | Node::Variable(_) => None,
            Node::Unary(_, child) => child.node_at_mut(index - 1),
            Node::Binary(_, left, right) => {
                let left_size = left.size();
                if index <= left_size {
                    left.node_at_mut(index - 1)
                } else {
                    right.node_at_mut(index - 1 - left_size)
                }
            }
        }
    }

    /// Depth at which the node with the given preorder index sits.
    fn level_of(&self, index: usize) -> Option<usize> {
        if index == 0 {
            return Some(0);
        }
        match self {
            Node::Constant(_) | Node::Variable(_) => None,
            Node::Unary(_, child) => child.level_of(index - 1).map(|l| l + 1),
            Node::Binary(_, left, right) => {
                let left_size = left.size();
                if index <= left_size {
                    left.level_of(index - 1).map(|l| l + 1)
                } else {
                    right.level_of(index - 1 - left_size).map(|l| l + 1)
                }
            }
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Constant(c) => write!(f, "{}", c),
            Node::Variable(i) => write!(f, "x{}", i),
            Node::Unary(op, child) => write!(f, "{}({})", op.symbol(), child),
            Node::Binary(op, left, right) => write!(f, "({} {} {})", left, op.symbol(), right),
        }
    }
}

/// Limits and primitive sets used to grow random trees.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone)]
pub struct TreeConfig {
    /// Number of input variables a `Variable` terminal may reference.
    pub variables: usize,
    pub max_depth: usize,
    pub max_size: usize,
    pub constant_range: (f64, f64),
    /// Probability of choosing a terminal before the depth limit is reached.
    pub terminal_probability: f64,
    pub unary_operators: Vec<UnaryOperator>,
    pub binary_operators: Vec<BinaryOperator>,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            variables: 1,
            max_depth: 6,
            max_size: 64,
            constant_range: (-1.0, 1.0),
            terminal_probability: 0.3,
            unary_operators: vec![UnaryOperator::Sin, UnaryOperator::Cos],
            binary_operators: vec![
                BinaryOperator::Add,
                BinaryOperator::Sub,
                BinaryOperator::Mul,
                BinaryOperator::Div,
            ],
        }
    }
}

impl TreeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 || self.max_depth == 0 {
            return Err(OptimizationError::Configuration(
                "Maximum tree size and depth must be greater than 0".to_string(),
            ));
        }
        if self.binary_operators.is_empty() && self.unary_operators.is_empty() {
            return Err(OptimizationError::Configuration(
                "At least one tree operator is required".to_string(),
            ));
        }
        if self.constant_range.0 > self.constant_range.1 {
            return Err(OptimizationError::Configuration(
                "Constant range lower bound exceeds upper bound".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.terminal_probability) {
            return Err(OptimizationError::Configuration(
                "Terminal probability must be between 0.0 and 1.0".to_string(),
            ));
        }
        Ok(())
    }

    fn random_terminal(&self, rng: &mut RandomNumberGenerator) -> Node {
        if self.variables > 0 && rng.bernoulli(0.5) {
            Node::Variable(rng.index(self.variables))
        } else {
            Node::Constant(rng.range_f64(self.constant_range.0, self.constant_range.1))
        }
    }

    /// Grows a random subtree no deeper than `depth`.
    pub fn grow(&self, depth: usize, rng: &mut RandomNumberGenerator) -> Node {
        if depth == 0 || rng.bernoulli(self.terminal_probability) {
            return self.random_terminal(rng);
        }
        let total = self.unary_operators.len() + self.binary_operators.len();
        let pick = rng.index(total);
        if pick < self.unary_operators.len() {
            Node::unary(self.unary_operators[pick], self.grow(depth - 1, rng))
        } else {
            let op = self.binary_operators[pick - self.unary_operators.len()];
            Node::binary(op, self.grow(depth - 1, rng), self.grow(depth - 1, rng))
        }
    }

    /// Generates a random tree within both the depth and the size limit.
    ///
    /// Grown trees that exceed the size limit are discarded; after a few attempts a
    /// single terminal is returned, which always satisfies the bound.
    pub fn random_tree(&self, rng: &mut RandomNumberGenerator) -> ExpressionTree {
        for _ in 0..10 {
            let depth = rng.range_i64(1, self.max_depth.max(1) as i64) as usize;
            let root = self.grow(depth, rng);
            if root.size() <= self.max_size {
                return ExpressionTree::new(root);
            }
        }
        ExpressionTree::new(self.random_terminal(rng))
    }
}

/// A rooted expression tree.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionTree {
    root: Node,
}

impl ExpressionTree {
    pub fn new(root: Node) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn size(&self) -> usize {
        self.root.size()
    }

    pub fn depth(&self) -> usize {
        self.root.depth()
    }

    pub fn evaluate(&self, inputs: &[f64]) -> f64 {
        self.root.evaluate(inputs)
    }

    /// Returns the subtree rooted at the given preorder index.
    pub fn subtree(&self, index: usize) -> Option<&Node> {
        self.root.node_at(index)
    }

    /// Depth of the node at `index` below the root.
    pub fn level_of(&self, index: usize) -> Option<usize> {
        self.root.level_of(index)
    }

    /// Replaces the subtree at `index`, returning the one that was removed.
    pub fn replace_subtree(&mut self, index: usize, replacement: Node) -> Result<Node> {
        let size = self.size();
        let slot = self
            .root
            .node_at_mut(index)
            .ok_or_else(|| crate::error::out_of_range("Tree node", index, size))?;
        Ok(std::mem::replace(slot, replacement))
    }
}

impl fmt::Display for ExpressionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.root)
    }
}
