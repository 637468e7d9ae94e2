use fms_core::ZONE_COUNT;

/// Field LED control. The arena drives this on phase transitions and on
/// every live tick; implementations are expected to deduplicate unchanged
/// state themselves.
pub trait FieldLights: Send {
    /// One-time hardware initialization at process start.
    fn setup(&mut self);
    fn clear_all(&mut self);
    /// Live per-zone strength feedback during play.
    fn set_zone_strengths(&mut self, red: [i32; ZONE_COUNT], blue: [i32; ZONE_COUNT]);
    /// Post-match pattern indicating the field is reset and safe.
    fn set_field_reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Cleared,
    Strengths([i32; ZONE_COUNT], [i32; ZONE_COUNT]),
    FieldReset,
}

/// Stand-in driver that logs pattern changes; used when no LED hardware is
/// attached.
#[derive(Debug)]
pub struct LogLights {
    last: Option<Pattern>,
}

impl LogLights {
    pub fn new() -> Self {
        Self { last: None }
    }

    fn apply(&mut self, pattern: Pattern) {
        if self.last != Some(pattern) {
            log::debug!("Field lights: {:?}", pattern);
            self.last = Some(pattern);
        }
    }
}

impl Default for LogLights {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldLights for LogLights {
    fn setup(&mut self) {
        self.apply(Pattern::Cleared);
    }

    fn clear_all(&mut self) {
        self.apply(Pattern::Cleared);
    }

    fn set_zone_strengths(&mut self, red: [i32; ZONE_COUNT], blue: [i32; ZONE_COUNT]) {
        self.apply(Pattern::Strengths(red, blue));
    }

    fn set_field_reset(&mut self) {
        self.apply(Pattern::FieldReset);
    }
}
