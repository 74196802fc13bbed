//! Cyclic Reference Detector.
//!
//! Finds the runtime types that participate in reference cycles reachable from
//! a root value. A type is reported when some object of that type can be
//! reached again from itself, whichever path first led to it. Objects reached
//! through several acyclic paths are never reported.
//!
//! The object graph is condensed into strongly connected components with an
//! explicit-stack Tarjan pass:
//!
//! - every component with more than one object is a cycle, and so is an object
//!   holding a reference to itself;
//! - lists, maps and named wrappers have no identity and are flattened into
//!   the edges of the object that owns them;
//! - values matching a skip predicate contribute no edges at all.
//!
//! Each identity is entered once, so time and space stay linear in the number
//! of distinct reachable objects and deep graphs cannot overflow the call stack.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tracing::trace;

use crate::value::{Identity, ObjectRef, TypeName, Value};

/// Caller-supplied predicate; matching values are not descended into.
pub type CycleSkip = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

#[derive(Debug, Clone, Copy)]
struct Visit {
    index: usize,
    lowlink: usize,
    on_stack: bool,
}

struct Frame {
    object: ObjectRef,
    id: Identity,
    children: std::vec::IntoIter<ObjectRef>,
    self_loop: bool,
}

/// Strongly-connected-component cycle detector over a [`Value`] graph.
pub struct CycleDetector<'a> {
    skips: &'a [CycleSkip],
    visits: HashMap<Identity, Visit>,
    component: Vec<ObjectRef>,
    found: BTreeSet<TypeName>,
}

impl<'a> CycleDetector<'a> {
    pub fn new(skips: &'a [CycleSkip]) -> Self {
        Self {
            skips,
            visits: HashMap::new(),
            component: Vec::new(),
            found: BTreeSet::new(),
        }
    }

    /// Traverses `root` and returns every type on a reference cycle.
    pub fn detect(mut self, root: &Value) -> BTreeSet<TypeName> {
        for start in self.objects_in(vec![root.clone()]) {
            if !self.visits.contains_key(&start.identity()) {
                self.strong_connect(start);
            }
        }
        self.found
    }

    fn strong_connect(&mut self, start: ObjectRef) {
        let mut stack = vec![self.open(start)];

        while let Some(frame) = stack.last_mut() {
            let id = frame.id;
            match frame.children.next() {
                Some(child) => {
                    let child_id = child.identity();
                    if child_id == id {
                        frame.self_loop = true;
                    }
                    match self.visits.get(&child_id).copied() {
                        None => {
                            let opened = self.open(child);
                            stack.push(opened);
                        }
                        Some(visit) if visit.on_stack => self.lower(id, visit.index),
                        Some(_) => {}
                    }
                }
                None => {
                    let Some(done) = stack.pop() else {
                        break;
                    };
                    let lowlink = self.visits.get(&done.id).map_or(0, |v| v.lowlink);
                    if let Some(parent) = stack.last() {
                        self.lower(parent.id, lowlink);
                    }
                    self.close(done);
                }
            }
        }
    }

    fn open(&mut self, object: ObjectRef) -> Frame {
        let id = object.identity();
        let index = self.visits.len();
        self.visits.insert(
            id,
            Visit {
                index,
                lowlink: index,
                on_stack: true,
            },
        );
        self.component.push(object.clone());
        let children = self.objects_in(object.field_values()).into_iter();
        Frame {
            object,
            id,
            children,
            self_loop: false,
        }
    }

    fn lower(&mut self, id: Identity, candidate: usize) {
        if let Some(visit) = self.visits.get_mut(&id) {
            visit.lowlink = visit.lowlink.min(candidate);
        }
    }

    /// Pops the component rooted at `frame` once all of its edges were seen.
    fn close(&mut self, frame: Frame) {
        let Some(visit) = self.visits.get(&frame.id).copied() else {
            return;
        };
        if visit.lowlink != visit.index {
            return;
        }

        let mut members = Vec::new();
        while let Some(member) = self.component.pop() {
            let member_id = member.identity();
            if let Some(v) = self.visits.get_mut(&member_id) {
                v.on_stack = false;
            }
            members.push(member);
            if member_id == frame.id {
                break;
            }
        }

        if members.len() > 1 || frame.self_loop {
            for member in &members {
                let type_name = member.type_name();
                trace!(%type_name, size = members.len(), "type on reference cycle");
                self.found.insert(type_name);
            }
        } else {
            trace!(type_name = %frame.object.type_name(), "acyclic object");
        }
    }

    /// Objects directly reachable from `values` through identity-less containers.
    fn objects_in(&self, values: Vec<Value>) -> Vec<ObjectRef> {
        let mut pending: Vec<Value> = values.into_iter().rev().collect();
        let mut objects = Vec::new();
        while let Some(value) = pending.pop() {
            if self.skips.iter().any(|skip| skip(&value)) {
                continue;
            }
            match value {
                Value::Null
                | Value::Bool(_)
                | Value::Int(_)
                | Value::UInt(_)
                | Value::Float(_)
                | Value::String(_) => {}
                Value::Named(_, inner) => pending.push(*inner),
                Value::List(items) => pending.extend(items.into_iter().rev()),
                Value::Map(entries) => pending.extend(entries.into_iter().rev().map(|(_, v)| v)),
                Value::Object(object) => objects.push(object),
            }
        }
        objects
    }
}

/// Returns the set of types that must be encoded with a cycle-safe stub.
pub fn detect_cyclic_types(root: &Value, skips: &[CycleSkip]) -> BTreeSet<TypeName> {
    CycleDetector::new(skips).detect(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ObjectRef;

    fn names(set: &BTreeSet<TypeName>) -> Vec<&str> {
        set.iter().map(TypeName::as_str).collect()
    }

    #[test]
    fn self_reference_is_reported() {
        let node = ObjectRef::new("Node").with_field("name", "root");
        node.set("me", node.clone());
        let found = detect_cyclic_types(&Value::Object(node), &[]);
        assert_eq!(names(&found), vec!["Node"]);
    }

    #[test]
    fn shared_diamond_is_not_a_cycle() {
        let leaf = ObjectRef::new("Leaf").with_field("v", 1);
        let left = ObjectRef::new("Left").with_field("leaf", leaf.clone());
        let right = ObjectRef::new("Right").with_field("leaf", leaf);
        let root = ObjectRef::new("Root")
            .with_field("left", left)
            .with_field("right", right);
        assert!(detect_cyclic_types(&Value::Object(root), &[]).is_empty());
    }

    #[test]
    fn cycles_in_separate_subgraphs_are_all_found() {
        let root = ObjectRef::new("Four");
        let child1 = ObjectRef::new("Four");
        let child2 = ObjectRef::new("Four");
        root.set("generic", child1.clone());
        child1.set("generic", root.clone());
        root.set("sub", child2.clone());

        let sub_root = ObjectRef::new("One");
        let sub_child = ObjectRef::new("One");
        sub_root.set("generic", sub_child.clone());
        sub_child.set("generic", sub_root.clone());
        child2.set("generic", sub_root);

        let found = detect_cyclic_types(&Value::Object(root), &[]);
        assert_eq!(names(&found), vec!["Four", "One"]);
    }

    #[test]
    fn cycles_through_lists_and_maps_are_found() {
        let parent = ObjectRef::new("Parent");
        let child = ObjectRef::new("Child").with_field("parent", parent.clone());
        parent.set(
            "children",
            Value::Map(vec![("first".into(), Value::List(vec![Value::Object(child)]))]),
        );
        let found = detect_cyclic_types(&Value::Object(parent), &[]);
        assert_eq!(names(&found), vec!["Parent"]);
    }

    #[test]
    fn skip_predicate_prevents_descent() {
        let a = ObjectRef::new("One");
        let b = ObjectRef::new("One");
        a.set("next", b.clone());
        b.set("next", a.clone());
        let skip: CycleSkip = Arc::new(|v: &Value| {
            v.type_name().map(|t| t.as_str() == "One").unwrap_or(false)
        });
        let holder = ObjectRef::new("Holder").with_field("one", a);
        assert!(detect_cyclic_types(&Value::Object(holder), &[skip]).is_empty());
    }

    #[test]
    fn cycle_entered_through_a_second_path_reports_every_member() {
        let alpha = ObjectRef::new("Alpha");
        let beta = ObjectRef::new("Beta");
        alpha.set("b", beta.clone());
        beta.set("a", alpha.clone());
        let root = ObjectRef::new("Root")
            .with_field("a", alpha)
            .with_field("b", beta);
        let found = detect_cyclic_types(&Value::Object(root), &[]);
        assert_eq!(names(&found), vec!["Alpha", "Beta"]);
    }

    #[test]
    fn tail_leading_into_a_cycle_is_not_reported() {
        let lead = ObjectRef::new("Lead");
        let ring = ObjectRef::new("Ring");
        ring.set("next", ring.clone());
        lead.set("ring", ring);
        let root = Value::List(vec![Value::Object(lead)]);
        assert_eq!(names(&detect_cyclic_types(&root, &[])), vec!["Ring"]);
    }

    #[test]
    fn repeated_scalars_are_never_cycles() {
        let value = Value::List(vec![Value::from("x"), Value::from("x"), Value::from(1)]);
        assert!(detect_cyclic_types(&value, &[]).is_empty());
        assert!(detect_cyclic_types(&Value::Null, &[]).is_empty());
    }

    #[test]
    fn long_chain_does_not_overflow_the_stack() {
        let head = ObjectRef::new("Link");
        let mut tail = head.clone();
        for _ in 0..100_000 {
            let next = ObjectRef::new("Link");
            tail.set("next", next.clone());
            tail = next;
        }
        tail.set("next", head.clone());
        let found = detect_cyclic_types(&Value::Object(head), &[]);
        assert_eq!(names(&found), vec!["Link"]);
    }
}
