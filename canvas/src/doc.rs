//! Document model: the ordered, in-memory stroke store.
//!
//! `StrokeStore` owns every stroke currently on the local canvas, in draw
//! order. Data flows into this layer from the network (snapshots and
//! broadcasts applied by the sync adapter) and from local drawing. The
//! renderer reads it front to back via [`StrokeStore::strokes`].
//!
//! Operations are positional. The store never looks at stroke ids, so two
//! strokes sharing an id are two entries here; uniqueness is enforced by the
//! caller.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use frames::Stroke;

/// In-memory store of strokes in draw order.
#[derive(Debug, Default)]
pub struct StrokeStore {
    strokes: Vec<Stroke>,
}

impl StrokeStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self { strokes: Vec::new() }
    }

    /// Append a stroke on top of the draw order. Returns its position.
    pub fn push(&mut self, stroke: Stroke) -> usize {
        self.strokes.push(stroke);
        self.strokes.len() - 1
    }

    /// Insert a stroke at `index`, shifting later strokes up by one. Returns
    /// false if `index` is past the end.
    pub fn insert(&mut self, index: usize, stroke: Stroke) -> bool {
        if index > self.strokes.len() {
            return false;
        }
        self.strokes.insert(index, stroke);
        true
    }

    /// Remove the stroke at `index`, shifting later strokes down by one.
    pub fn remove(&mut self, index: usize) -> Option<Stroke> {
        if index < self.strokes.len() {
            Some(self.strokes.remove(index))
        } else {
            None
        }
    }

    /// Translate every point of the stroke at `index`. Returns false if there
    /// is no such stroke.
    pub fn translate(&mut self, index: usize, dx: f64, dy: f64) -> bool {
        let Some(stroke) = self.strokes.get_mut(index) else {
            return false;
        };
        stroke.translate(dx, dy);
        true
    }

    /// Return the stroke at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Stroke> {
        self.strokes.get(index)
    }

    /// Replace all strokes with a full snapshot.
    pub fn load_snapshot(&mut self, strokes: Vec<Stroke>) {
        self.strokes = strokes;
    }

    /// Remove every stroke.
    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// All strokes in draw order.
    #[must_use]
    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// Number of strokes currently in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    /// Returns `true` if the store contains no strokes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}
