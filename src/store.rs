use crate::splat::Splat;

/// Append-only scene content for one loaded scene.
///
/// `count()` is the only thing the encoder and sorter consult to know how far
/// the store has advanced; a batch becomes visible all at once.
#[derive(Debug, Default)]
pub struct SplatStore {
    splats: Vec<Splat>,
}

impl SplatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.splats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splats.is_empty()
    }

    /// Appends a batch and returns the index of its first record.
    pub fn append(&mut self, batch: Vec<Splat>) -> usize {
        let first = self.splats.len();
        if first == 0 {
            self.splats = batch;
        } else {
            self.splats.extend(batch);
        }
        first
    }

    pub fn as_slice(&self) -> &[Splat] {
        &self.splats
    }

    /// Drops the scene; the next append starts a new one at index 0.
    pub fn clear(&mut self) {
        self.splats = Vec::new();
    }
}
