use frames::Stroke;

use crate::doc::StrokeStore;

#[cfg(test)]
#[path = "engine_test.rs"]
mod engine_test;

/// Failure of a local engine operation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// The engine has not been mounted yet (or was unmounted).
    #[error("drawing engine is not ready")]
    NotReady,
    /// The position does not address a stroke.
    #[error("stroke index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// The local drawing engine.
///
/// Every operation is synchronous and local. Until [`Engine::mount`] is
/// called every mutation and query fails with [`EngineError::NotReady`],
/// mirroring a renderer that has no surface yet.
#[derive(Debug, Default)]
pub struct Engine {
    doc: StrokeStore,
    ready: bool,
}

impl Engine {
    /// Create an unmounted engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine that is already mounted.
    #[must_use]
    pub fn mounted() -> Self {
        Self { doc: StrokeStore::new(), ready: true }
    }

    /// Mark the engine ready for operations.
    pub fn mount(&mut self) {
        self.ready = true;
    }

    /// Mark the engine not ready. Strokes are kept.
    pub fn unmount(&mut self) {
        self.ready = false;
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    fn check_ready(&self) -> Result<(), EngineError> {
        if self.ready { Ok(()) } else { Err(EngineError::NotReady) }
    }

    fn check_index(&self, index: usize) -> Result<(), EngineError> {
        let len = self.doc.len();
        if index < len { Ok(()) } else { Err(EngineError::IndexOutOfRange { index, len }) }
    }

    // --- Mutations ---

    /// Append a stroke. Returns its position.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount.
    pub fn add(&mut self, stroke: Stroke) -> Result<usize, EngineError> {
        self.check_ready()?;
        Ok(self.doc.push(stroke))
    }

    /// Insert a stroke at `index`; `index == len` appends.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount and
    /// [`EngineError::IndexOutOfRange`] past the end.
    pub fn insert_at(&mut self, index: usize, stroke: Stroke) -> Result<(), EngineError> {
        self.check_ready()?;
        let len = self.doc.len();
        if self.doc.insert(index, stroke) { Ok(()) } else { Err(EngineError::IndexOutOfRange { index, len }) }
    }

    /// Remove the stroke at `index`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount and
    /// [`EngineError::IndexOutOfRange`] for a bad position.
    pub fn remove_at(&mut self, index: usize) -> Result<Stroke, EngineError> {
        self.check_ready()?;
        self.check_index(index)?;
        self.doc
            .remove(index)
            .ok_or(EngineError::IndexOutOfRange { index, len: self.doc.len() })
    }

    /// Translate the stroke at `index` by `(dx, dy)`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount and
    /// [`EngineError::IndexOutOfRange`] for a bad position.
    pub fn translate_at(&mut self, index: usize, dx: f64, dy: f64) -> Result<(), EngineError> {
        self.check_ready()?;
        self.check_index(index)?;
        self.doc.translate(index, dx, dy);
        Ok(())
    }

    /// Remove every stroke.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount.
    pub fn clear(&mut self) -> Result<(), EngineError> {
        self.check_ready()?;
        self.doc.clear();
        Ok(())
    }

    /// Replace the whole document with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount.
    pub fn load_snapshot(&mut self, strokes: Vec<Stroke>) -> Result<(), EngineError> {
        self.check_ready()?;
        self.doc.load_snapshot(strokes);
        Ok(())
    }

    // --- Queries ---

    /// All strokes in draw order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotReady`] before mount.
    pub fn strokes(&self) -> Result<&[Stroke], EngineError> {
        self.check_ready()?;
        Ok(self.doc.strokes())
    }

    /// Look up a stroke by position.
    #[must_use]
    pub fn stroke(&self, index: usize) -> Option<&Stroke> {
        self.doc.get(index)
    }

    /// Number of strokes, regardless of readiness.
    #[must_use]
    pub fn len(&self) -> usize {
        self.doc.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.doc.is_empty()
    }
}
