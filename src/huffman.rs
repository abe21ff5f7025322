// src/huffman.rs
//! Huffman trees rebuilt from probability contexts, and the bit-by-bit
//! decoder that walks them.
//!
//! Tree construction repeatedly pops the two lightest nodes from a binary
//! min-heap and merges them (first popped on the left). Equal counts are
//! ordered by whatever the heap's sift order produces, so the resulting code
//! is a valid prefix code but not a canonical one. Encoder and decoder agree
//! only because both build the tree the same way.
//!
//! Bit convention: 1 descends left, 0 descends right.

use crate::bitreader::BitStream;
use crate::context::{ContextEntry, ESCAPE_SYMBOL};
use crate::driver::{CodecDriver, OutOfBandQueue};
use crate::error::{CodecError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapItem {
    count: u64,
    node:  usize,
}

/// 0-based array min-heap keyed on occurrence count.
#[derive(Debug, Default)]
struct MinHeap {
    items: Vec<HeapItem>,
}

impl MinHeap {
    fn len(&self) -> usize {
        self.items.len()
    }

    fn push(&mut self, item: HeapItem) {
        self.items.push(item);
        let mut i = self.items.len() - 1;
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.items[parent].count > item.count {
                self.items[i] = self.items[parent];
                i = parent;
            } else {
                break;
            }
        }
        self.items[i] = item;
    }

    fn pop(&mut self) -> Option<HeapItem> {
        let top = *self.items.first()?;
        let last = self.items.pop()?;
        if self.items.is_empty() {
            return Some(top);
        }

        let size = self.items.len();
        let mut i = 0;
        loop {
            let mut child = 2 * i + 1;
            if child >= size {
                break;
            }
            if child + 1 < size && self.items[child].count > self.items[child + 1].count {
                child += 1;
            }
            if last.count < self.items[child].count {
                break;
            }
            self.items[i] = self.items[child];
            i = child;
        }
        self.items[i] = last;
        Some(top)
    }
}

/// What a leaf decodes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanLeaf {
    pub symbol:           i32,
    pub associated_value: i32,
}

impl HuffmanLeaf {
    pub fn is_escape(&self) -> bool {
        self.symbol == ESCAPE_SYMBOL
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf(HuffmanLeaf),
    Internal { left: usize, right: usize },
}

/// One leaf's code: the low `length` bits of `code`, first bit most
/// significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HuffmanCode {
    pub leaf:   HuffmanLeaf,
    pub code:   u64,
    pub length: u32,
}

#[derive(Debug, Clone)]
pub struct HuffmanTree {
    nodes: Vec<Node>,
    root:  Option<usize>,
}

impl HuffmanTree {
    /// Build the tree for one context. Entries are pushed in table order.
    pub fn build(entries: &[ContextEntry]) -> Self {
        let mut nodes = Vec::with_capacity(entries.len() * 2);
        let mut heap = MinHeap::default();

        for entry in entries {
            nodes.push(Node::Leaf(HuffmanLeaf {
                symbol:           entry.symbol,
                associated_value: entry.associated_value,
            }));
            heap.push(HeapItem { count: entry.occurrence_count as u64, node: nodes.len() - 1 });
        }

        while heap.len() > 1 {
            let (Some(first), Some(second)) = (heap.pop(), heap.pop()) else {
                break;
            };
            nodes.push(Node::Internal { left: first.node, right: second.node });
            heap.push(HeapItem { count: first.count + second.count, node: nodes.len() - 1 });
        }

        let root = heap.pop().map(|item| item.node);
        Self { nodes, root }
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf(_))).count()
    }

    /// Code of every leaf, in depth-first order with left subtrees first.
    pub fn code_table(&self) -> Vec<HuffmanCode> {
        let mut codes = Vec::with_capacity(self.leaf_count());
        let mut stack: Vec<(usize, u64, u32)> = self.root.map(|r| (r, 0, 0)).into_iter().collect();

        while let Some((node, code, length)) = stack.pop() {
            match self.nodes[node] {
                Node::Leaf(leaf) => codes.push(HuffmanCode { leaf, code, length }),
                Node::Internal { left, right } => {
                    stack.push((right, code.wrapping_shl(1), length + 1));
                    stack.push((left, code.wrapping_shl(1) | 1, length + 1));
                }
            }
        }
        codes
    }

    /// Decode codes until the stream is exhausted, appending to `decoded`.
    pub fn decode_into(
        &self,
        stream: &mut BitStream<'_>,
        out_of_band: &mut OutOfBandQueue<'_>,
        decoded: &mut Vec<i32>,
    ) -> Result<()> {
        let Some(root) = self.root else {
            if stream.is_at_end() {
                return Ok(());
            }
            return Err(CodecError::corrupt("code text left over for an empty Huffman context"));
        };

        let mut node = root;
        while !stream.is_at_end() {
            let bit = stream.read_bit()?;
            node = match self.nodes[node] {
                Node::Internal { left, right } => if bit { left } else { right },
                Node::Leaf(_) => {
                    return Err(CodecError::corrupt("Huffman tree has a single leaf; no code to walk"));
                }
            };
            if let Node::Leaf(leaf) = self.nodes[node] {
                if leaf.is_escape() {
                    decoded.push(out_of_band.pop()?);
                } else {
                    decoded.push(leaf.associated_value);
                }
                node = root;
            }
        }

        if node != root {
            return Err(CodecError::exhausted("Huffman code", 1, 0));
        }
        Ok(())
    }
}

/// Decode the driver's code text, one context after another.
pub fn decode(driver: &CodecDriver<'_>) -> Result<Vec<i32>> {
    let trees: Vec<HuffmanTree> = driver
        .contexts()
        .tables()
        .iter()
        .map(|entries| HuffmanTree::build(entries))
        .collect();

    let mut stream = driver.bit_stream()?;
    if trees.is_empty() && !stream.is_at_end() {
        return Err(CodecError::malformed("Huffman code text without probability contexts"));
    }

    let mut out_of_band = driver.out_of_band();
    let mut decoded = Vec::with_capacity(driver.value_element_count());
    for (context, tree) in trees.iter().enumerate() {
        let before = decoded.len();
        tree.decode_into(&mut stream, &mut out_of_band, &mut decoded)?;
        log::trace!(
            "huffman context {}: {} leaves, {} values",
            context,
            tree.leaf_count(),
            decoded.len() - before
        );
    }

    log::debug!(
        "huffman: {} values from {} bits, {} out-of-band",
        decoded.len(),
        driver.code_text_len_bits(),
        out_of_band.consumed()
    );
    Ok(decoded)
}
