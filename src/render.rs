//! Render batching by shader program.
//!
//! The [`ProgramCache`] sorts every renderable of a scene into one bucket per
//! program. Rendering walks the buckets so that binding a program and applying
//! its camera state happens once per program and frame, not once per object.
//!
//! Membership is filled in when a scene is attached and is not kept in sync
//! with the tree afterwards. Changing a renderable's program or detaching it
//! requires [`ProgramCache::remove`] (see `Scene::uninitialize_node`).

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::data_structures::scene_graph::NodeId;

/// The renderables drawn with one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramBucket {
    program: String,
    members: HashSet<NodeId>,
}

impl ProgramBucket {
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Members in no particular order.
    pub fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.members.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Buckets of renderables keyed by program name, in order of first insertion.
#[derive(Debug, Default, Clone)]
pub struct ProgramCache {
    buckets: Vec<ProgramBucket>,
    lookup: HashMap<String, usize>,
}

impl ProgramCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `id` to the bucket of `program`, creating the bucket if needed.
    /// Returns `false` if it already was a member.
    pub fn insert(&mut self, program: &str, id: NodeId) -> bool {
        let idx = match self.lookup.get(program) {
            Some(idx) => *idx,
            None => {
                debug!("New program bucket {program}");
                self.buckets.push(ProgramBucket {
                    program: program.to_string(),
                    members: HashSet::new(),
                });
                self.lookup.insert(program.to_string(), self.buckets.len() - 1);
                self.buckets.len() - 1
            }
        };
        self.buckets[idx].members.insert(id)
    }

    /// Removes `id` from whichever bucket holds it. Emptied buckets are kept
    /// so the bucket order stays stable.
    pub fn remove(&mut self, id: NodeId) -> bool {
        self.buckets
            .iter_mut()
            .any(|bucket| bucket.members.remove(&id))
    }

    pub fn buckets(&self) -> &[ProgramBucket] {
        &self.buckets
    }

    pub fn bucket(&self, program: &str) -> Option<&ProgramBucket> {
        self.lookup.get(program).map(|idx| &self.buckets[*idx])
    }

    /// Program whose bucket holds `id`.
    pub fn program_of(&self, id: NodeId) -> Option<&str> {
        self.buckets
            .iter()
            .find(|bucket| bucket.contains(id))
            .map(|bucket| bucket.program.as_str())
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.program_of(id).is_some()
    }

    /// Number of buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn members_are_grouped_by_program_in_first_seen_order() {
        let mut cache = ProgramCache::new();
        let (a, b, c) = (NodeId::next(), NodeId::next(), NodeId::next());

        assert!(cache.insert("color", a));
        assert!(cache.insert("simple", b));
        assert!(cache.insert("color", c));
        assert!(!cache.insert("color", c));

        let programs: Vec<_> = cache.buckets().iter().map(|b| b.program()).collect();
        assert_eq!(programs, ["color", "simple"]);
        assert_eq!(cache.bucket("color").map(ProgramBucket::len), Some(2));
        assert_eq!(cache.program_of(b), Some("simple"));
    }

    #[test]
    fn removal_keeps_the_emptied_bucket() {
        let mut cache = ProgramCache::new();
        let id = NodeId::next();
        cache.insert("simple", id);

        assert!(cache.remove(id));
        assert!(!cache.remove(id));
        assert!(!cache.contains(id));
        assert_eq!(cache.len(), 1);
        assert!(cache.bucket("simple").unwrap().is_empty());

        cache.clear();
        assert!(cache.is_empty());
    }
}
