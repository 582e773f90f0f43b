// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call resolution chain.
//!
//! A small copy-on-write, open-addressed map optimized for eight or fewer
//! entries. During recursive resolution it carries in-progress structural
//! codecs so a self-referential type graph (a node holding a list of
//! itself) finds its own codec instead of recursing forever. Inserting
//! returns a new chain; the parent's chain is untouched when a recursion
//! level unwinds.

use crate::codec::Codec;
use crate::descriptor::TypeDescriptor;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const INLINE_SLOTS: usize = 8;

type Entry = (Arc<TypeDescriptor>, Arc<Codec>);

/// Copy-on-write open-addressed map of in-progress codecs.
#[derive(Debug, Clone, Default)]
pub struct ResolveChain {
    slots: [Option<Entry>; INLINE_SLOTS],
    /// Overflow for the rare >8-deep recursive type graph.
    spill: Vec<Entry>,
}

impl ResolveChain {
    pub fn new() -> Self {
        Self::default()
    }

    fn home_slot(descriptor: &TypeDescriptor) -> usize {
        let mut hasher = DefaultHasher::new();
        descriptor.hash(&mut hasher);
        (hasher.finish() as usize) % INLINE_SLOTS
    }

    /// In-progress codec for `descriptor`, if registered.
    pub fn get(&self, descriptor: &TypeDescriptor) -> Option<Arc<Codec>> {
        let home = Self::home_slot(descriptor);
        for probe in 0..INLINE_SLOTS {
            match &self.slots[(home + probe) % INLINE_SLOTS] {
                Some((desc, codec)) => {
                    if **desc == *descriptor {
                        return Some(codec.clone());
                    }
                }
                None => break,
            }
        }
        self.spill
            .iter()
            .find(|(desc, _)| **desc == *descriptor)
            .map(|(_, codec)| codec.clone())
    }

    /// New chain with `descriptor` registered. The receiver is unchanged.
    pub fn with(&self, descriptor: Arc<TypeDescriptor>, codec: Arc<Codec>) -> Self {
        let mut next = self.clone();
        let home = Self::home_slot(&descriptor);
        for probe in 0..INLINE_SLOTS {
            let slot = &mut next.slots[(home + probe) % INLINE_SLOTS];
            if slot.is_none() {
                *slot = Some((descriptor, codec));
                return next;
            }
        }
        next.spill.push((descriptor, codec));
        next
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count() + self.spill.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
