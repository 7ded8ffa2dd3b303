//! Append-only event collection for one realization.

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::ids::EventId;

/// An ordered, append-only collection of events.
///
/// A catalog is owned by the branching simulator while one realization is
/// generated and handed over to the orchestrator afterwards. Insertion
/// order is preserved; ids are assigned by the caller and expected to be
/// unique.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    events: Vec<Event>,
}

impl Catalog {
    /// Create an empty catalog.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Wrap an existing list of events.
    pub const fn from_events(events: Vec<Event>) -> Self {
        Self { events }
    }

    /// Number of events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the catalog holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// All events in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterate over the events in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Append a batch of events.
    pub fn extend(&mut self, events: impl IntoIterator<Item = Event>) {
        self.events.extend(events);
    }

    /// Largest id in the catalog, or [`EventId::NONE`] when empty.
    pub fn max_id(&self) -> EventId {
        self.events
            .iter()
            .map(|e| e.id)
            .max()
            .unwrap_or(EventId::NONE)
    }

    /// Events of the given generation that still have aftershocks to produce.
    pub fn sources(&self, generation: u32) -> Vec<Event> {
        self.events
            .iter()
            .filter(|e| e.generation == generation && e.is_source())
            .cloned()
            .collect()
    }

    /// Number of events per generation, indexed by generation.
    pub fn generation_sizes(&self) -> Vec<usize> {
        let mut sizes: Vec<usize> = Vec::new();
        for event in &self.events {
            let g = event.generation as usize;
            if sizes.len() <= g {
                sizes.resize(g.saturating_add(1), 0);
            }
            if let Some(slot) = sizes.get_mut(g) {
                *slot = slot.saturating_add(1);
            }
        }
        sizes
    }

    /// Keep only the events matching the predicate.
    pub fn retain(&mut self, keep: impl FnMut(&Event) -> bool) {
        self.events.retain(keep);
    }

    /// Consume the catalog, returning its events.
    pub fn into_events(self) -> Vec<Event> {
        self.events
    }
}

impl IntoIterator for Catalog {
    type Item = Event;
    type IntoIter = std::vec::IntoIter<Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Event;
    type IntoIter = std::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}
