//! Vocabulary prefix tree over alphabet labels.
//!
//! Nodes live in one arena and children always have a larger index than
//! their parent, which keeps the serialized form trivially acyclic.

use crate::codec::{BlobReader, PutLe};
use crate::error::{ConfigError, LoadError, Result};

const WHAT: &str = "vocabulary trie";
const WORD_END: u8 = 0b1;

/// Position in a [`VocabularyTrie`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TrieState(u32);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Node {
    word_end: bool,
    /// Sorted by label.
    children: Vec<(u32, u32)>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabularyTrie {
    alphabet_size: usize,
    nodes: Vec<Node>,
    words: usize,
}

impl VocabularyTrie {
    /// Empty trie accepting labels in `0..alphabet_size`.
    pub fn new(alphabet_size: usize) -> Self {
        Self {
            alphabet_size,
            nodes: vec![Node::default()],
            words: 0,
        }
    }

    /// Build a trie from label sequences. Empty sequences are ignored.
    pub fn build<I, W>(alphabet_size: usize, words: I) -> Self
    where
        I: IntoIterator<Item = W>,
        W: AsRef<[u32]>,
    {
        let mut trie = Self::new(alphabet_size);
        for word in words {
            trie.insert(word.as_ref());
        }
        trie
    }

    /// Add one word. Returns `false` if it was already present or empty.
    ///
    /// Labels outside the alphabet are the caller's responsibility; the
    /// scorer only inserts encoded words.
    pub fn insert(&mut self, labels: &[u32]) -> bool {
        if labels.is_empty() {
            return false;
        }

        let mut node = 0usize;
        for &label in labels {
            node = match self.nodes[node]
                .children
                .binary_search_by_key(&label, |&(l, _)| l)
            {
                Ok(i) => self.nodes[node].children[i].1 as usize,
                Err(i) => {
                    let child = self.nodes.len();
                    self.nodes.push(Node::default());
                    self.nodes[node].children.insert(i, (label, child as u32));
                    child
                }
            };
        }

        let fresh = !self.nodes[node].word_end;
        self.nodes[node].word_end = true;
        self.words += usize::from(fresh);
        fresh
    }

    pub fn root(&self) -> TrieState {
        TrieState(0)
    }

    /// Follow `label` from `state`; `None` once no known word has this prefix.
    pub fn advance(&self, state: TrieState, label: u32) -> Option<TrieState> {
        let node = self.nodes.get(state.0 as usize)?;
        node.children
            .binary_search_by_key(&label, |&(l, _)| l)
            .ok()
            .map(|i| TrieState(node.children[i].1))
    }

    pub fn is_word_end(&self, state: TrieState) -> bool {
        self.nodes
            .get(state.0 as usize)
            .is_some_and(|node| node.word_end)
    }

    /// Whether the label sequence is a stored word.
    pub fn contains(&self, labels: &[u32]) -> bool {
        labels
            .iter()
            .try_fold(self.root(), |state, &label| self.advance(state, label))
            .is_some_and(|state| !labels.is_empty() && self.is_word_end(state))
    }

    pub fn alphabet_size(&self) -> usize {
        self.alphabet_size
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn word_count(&self) -> usize {
        self.words
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.nodes.len() * 5);
        out.put_u32(self.alphabet_size as u32);
        out.put_u32(self.nodes.len() as u32);
        for node in &self.nodes {
            out.put_u8(if node.word_end { WORD_END } else { 0 });
            out.put_u32(node.children.len() as u32);
            for &(label, child) in &node.children {
                out.put_u32(label);
                out.put_u32(child);
            }
        }
        out
    }

    /// Read a trie and check that it was built for `expected_alphabet_size`.
    pub fn deserialize(bytes: &[u8], expected_alphabet_size: usize) -> Result<Self> {
        let mut r = BlobReader::new(bytes, WHAT);

        let alphabet_size = r.u32()? as usize;
        if alphabet_size != expected_alphabet_size {
            return Err(ConfigError::TrieAlphabetMismatch {
                expected: expected_alphabet_size,
                found: alphabet_size,
            }
            .into());
        }

        let count = r.u32()? as usize;
        if count == 0 {
            return Err(r.corrupt("no root node").into());
        }
        // Each node takes at least five bytes.
        if count > bytes.len() / 5 {
            return Err(LoadError::Truncated { what: WHAT }.into());
        }

        let mut nodes = Vec::with_capacity(count);
        let mut words = 0;
        for index in 0..count {
            let flags = r.u8()?;
            let word_end = flags & WORD_END != 0;
            words += usize::from(word_end);

            let child_count = r.u32()? as usize;
            let mut children = Vec::with_capacity(child_count.min(alphabet_size));
            for _ in 0..child_count {
                let label = r.u32()?;
                let child = r.u32()?;
                if label as usize >= alphabet_size {
                    return Err(r.corrupt(format!("label {label} outside alphabet")).into());
                }
                if children.last().is_some_and(|&(prev, _)| prev >= label) {
                    return Err(r.corrupt("children not sorted by label").into());
                }
                if child as usize <= index || child as usize >= count {
                    return Err(r.corrupt(format!("node {index} has bad child {child}")).into());
                }
                children.push((label, child));
            }
            nodes.push(Node { word_end, children });
        }

        if r.consumed() != bytes.len() as u64 {
            return Err(r.corrupt("trailing bytes").into());
        }

        Ok(Self {
            alphabet_size,
            nodes,
            words,
        })
    }
}
