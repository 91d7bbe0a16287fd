//! Core schema and primitives of the verimap paged sparse merkle trie.
//!
//! This crate defines the trie schema in a storage-agnostic manner: the
//! 64-bit digest type, the node value encoding, the paged node layout, and
//! the hasher abstraction. The database built on top of this schema lives in
//! the `verimap` crate.
//!
//! ## Schema
//!
//! The trie is a binary merkle trie of height 64. All lookup paths are
//! 64-bit digests produced by a [`hasher::LedgerHasher`]. There are three
//! kinds of nodes:
//!
//! 1. Interior nodes, which have two children. The value of an interior node
//!    is the hash of its children's values, with an empty child replaced by
//!    the default hash at the child's height.
//! 2. Shortcut nodes, which compress a sub-trie containing exactly one live
//!    entry into a single node carrying the entry's key digest and value.
//! 3. Leaf nodes at height 0, which carry raw value bytes.
//!
//! Interior and shortcut values carry a trailing flag byte distinguishing
//! the two; see [`trie`] for the exact encoding and [`page`] for how nodes
//! are packed into 31-slot pages.

#![warn(missing_docs)]

pub mod hasher;
pub mod page;
pub mod trie;
