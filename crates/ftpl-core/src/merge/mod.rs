/*
 * merge/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Structural merging of a base document with an overlay.
//!
//! `$merge` treats the referenced document as the base and the object (or
//! element) carrying the directive as the overlay. Both variants are total:
//! they always produce a concrete tree, deferring expression-dependent
//! merges to the renderer instead of failing.

mod json;
mod xml;

pub use json::merge_trees;
pub use xml::merge_elements;
