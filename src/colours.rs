use std::collections::BTreeMap;

use crate::record::Severity;

/// Colour used when no configured level is at or below the requested one.
pub const FALLBACK_COLOUR: u32 = 0xFFFFFF;

/// Embed colour per [`Severity`].
///
/// A level without its own entry takes the colour of the closest lower
/// level that has one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelColours {
    colours: BTreeMap<Severity, u32>,
}

impl LevelColours {
    pub fn new(colours: impl IntoIterator<Item = (Severity, u32)>) -> Self {
        LevelColours {
            colours: colours.into_iter().collect(),
        }
    }

    pub fn get(&self, level: Severity) -> u32 {
        self.colours
            .range(..=level)
            .next_back()
            .map_or(FALLBACK_COLOUR, |(_, colour)| *colour)
    }
}

impl Default for LevelColours {
    fn default() -> Self {
        LevelColours::new([
            (Severity::Trace, 0x888888),
            (Severity::Debug, 0x7289DA),
            (Severity::Info, 0x43B581),
            (Severity::Warn, 0xFAA61A),
            (Severity::Error, 0xF47B68),
            (Severity::Critical, 0xF04747),
        ])
    }
}
