//! Deterministic rectangle packing.
//!
//! Two strategies lay out blocks inside a fixed target area:
//!
//! - [`shelf`]: rows left to right, wrapping when a row is full.
//! - [`Packer`]: guillotine packing over a binary tree of free
//!   rectangles. Each placement splits one free rectangle into a right
//!   and a down remainder that tile it exactly; rectangles are never
//!   merged back.
//!
//! Neither strategy reorders its input. Sort with [`by_area`] first for
//! better utilization.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Placement of a block's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fit {
    pub x: f64,
    pub y: f64,
}

/// A rectangle to place. `fit` is set once it has been placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub w: f64,
    pub h: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit: Option<Fit>,
}

impl Block {
    /// An unplaced block.
    pub fn new(w: f64, h: f64) -> Self {
        Self { w, h, fit: None }
    }

    /// Width times height.
    pub fn area(&self) -> f64 {
        self.w * self.h
    }
}

/// Larger area first, then wider first.
pub fn by_area(a: &Block, b: &Block) -> Ordering {
    b.area()
        .total_cmp(&a.area())
        .then_with(|| b.w.total_cmp(&a.w))
}

/// Outcome of a packing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packing {
    /// Whether every block was placed.
    pub packed: bool,
    /// Right-most extent of placed blocks.
    pub max_w: f64,
    /// Bottom-most extent of placed blocks.
    pub max_h: f64,
}

/// Shelf packing: place blocks left to right, wrap to a new row when the
/// width is exceeded, stop at the first block that overflows the height.
///
/// Leftover space beside short blocks in a row is not reused.
pub fn shelf(blocks: &mut [Block], w: f64, h: f64, spacing: f64) -> Packing {
    let mut out = Packing {
        packed: true,
        max_w: 0.0,
        max_h: 0.0,
    };
    let (mut x, mut y, mut row) = (0.0_f64, 0.0_f64, 0.0_f64);

    for block in blocks.iter_mut() {
        if x > 0.0 && x + block.w > w {
            x = 0.0;
            y += row + spacing;
            row = 0.0;
        }
        if block.w > w || y + block.h > h {
            tracing::debug!("shelf packing stopped at {}x{}", block.w, block.h);
            block.fit = None;
            out.packed = false;
            break;
        }
        block.fit = Some(Fit { x, y });
        out.max_w = out.max_w.max(x + block.w);
        out.max_h = out.max_h.max(y + block.h);
        x += block.w + spacing;
        row = row.max(block.h);
    }

    out
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    used: bool,
    right: Option<usize>,
    down: Option<usize>,
}

impl Node {
    fn free(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            used: false,
            right: None,
            down: None,
        }
    }
}

/// Guillotine packer over an arena of free-rectangle nodes.
///
/// Node 0 is the root spanning the whole target area. A node is either a
/// free leaf or used with both children present.
#[derive(Debug, Clone)]
pub struct Packer {
    nodes: Vec<Node>,
    spacing: f64,
    max_w: f64,
    max_h: f64,
}

impl Packer {
    /// A packer for a `w` by `h` area. Every block occupies its size plus
    /// `spacing` in both directions.
    pub fn new(w: f64, h: f64, spacing: f64) -> Self {
        Self {
            nodes: vec![Node::free(0.0, 0.0, w, h)],
            spacing,
            max_w: 0.0,
            max_h: 0.0,
        }
    }

    /// Place blocks in order. Stops at the first block that does not fit
    /// and returns `false`; blocks already placed keep their fit.
    pub fn pack(&mut self, blocks: &mut [Block]) -> bool {
        for block in blocks.iter_mut() {
            if !self.place(block) {
                tracing::debug!("guillotine packing stopped at {}x{}", block.w, block.h);
                return false;
            }
        }
        true
    }

    /// Place one block. On failure the block's fit is cleared and the
    /// tree is unchanged.
    pub fn place(&mut self, block: &mut Block) -> bool {
        let (w, h) = (block.w + self.spacing, block.h + self.spacing);
        let Some(index) = self.find(w, h) else {
            block.fit = None;
            return false;
        };
        let fit = self.split(index, w, h);
        self.max_w = self.max_w.max(fit.x + block.w);
        self.max_h = self.max_h.max(fit.y + block.h);
        block.fit = Some(fit);
        true
    }

    /// Extent `(max_w, max_h)` of everything placed so far.
    pub fn max(&self) -> (f64, f64) {
        (self.max_w, self.max_h)
    }

    /// First free node that holds `w` by `h`, searching depth first with
    /// the right subtree before the down subtree.
    fn find(&self, w: f64, h: f64) -> Option<usize> {
        let mut stack = vec![0];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.used {
                stack.extend(node.down);
                stack.extend(node.right);
            } else if w <= node.w && h <= node.h {
                return Some(index);
            }
        }
        None
    }

    fn split(&mut self, index: usize, w: f64, h: f64) -> Fit {
        let Node { x, y, .. } = self.nodes[index];
        let (nw, nh) = (self.nodes[index].w, self.nodes[index].h);

        let right = self.nodes.len();
        self.nodes.push(Node::free(x + w, y, nw - w, h));
        let down = self.nodes.len();
        self.nodes.push(Node::free(x, y + h, nw, nh - h));

        let node = &mut self.nodes[index];
        node.used = true;
        node.right = Some(right);
        node.down = Some(down);
        Fit { x, y }
    }
}
