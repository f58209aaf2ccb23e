use smallvec::SmallVec;

/// Separator placed between held keys in a chord string.
pub const CHORD_SEPARATOR: char = '+';

/// Tracks which keys are currently held and renders them as a chord.
///
/// Keys are kept in the order they were pressed, so the chord for a given
/// history of presses and releases is always the same string.
#[derive(Clone, Debug, Default)]
pub struct KeyChord {
    held: SmallVec<[&'static str; 8]>,
}

impl KeyChord {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` as held. Empty symbols and keys that are already held are
    /// ignored.
    pub fn press(&mut self, key: &'static str) {
        if !key.is_empty() && !self.is_held(key) {
            self.held.push(key);
        }
    }

    /// Marks `key` as released. Releasing a key that is not held does nothing.
    pub fn release(&mut self, key: &'static str) {
        if key.is_empty() {
            return;
        }

        if let Some(i) = self.held.iter().position(|k| *k == key) {
            self.held.remove(i);
        }
    }

    #[must_use]
    pub fn is_held(&self, key: &str) -> bool {
        self.held.iter().any(|k| *k == key)
    }

    /// Held keys, oldest press first.
    pub fn held(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.held.iter().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    /// The held keys joined with [`CHORD_SEPARATOR`], in press order. Empty
    /// if nothing is held.
    #[must_use]
    pub fn current_chord(&self) -> String {
        let mut chord = String::new();
        for (i, key) in self.held.iter().enumerate() {
            if i > 0 {
                chord.push(CHORD_SEPARATOR);
            }
            chord.push_str(key);
        }
        chord
    }
}
