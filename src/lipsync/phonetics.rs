/// Articulatory class of a consonant symbol in the synthesizer's phoneme inventory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConsonantClass {
    /// Bilabial closure (`p`, `b`, `m`).
    Plosive,
    /// Oral closure (`k`, `g`, `t`, `d`).
    Stop,
    /// Mouth stays open (`s`, `sh`, `h`, `f`, `z`, `j`).
    Fricative,
    /// Brief closure, then release (`ch`, `ts`).
    Affricate,
    Nasal,
    Liquid,
    Glide,
    Other,
}

impl ConsonantClass {
    /// Whether this class needs the mouth fully closed for the whole consonant.
    pub fn requires_closure(self) -> bool {
        matches!(self, Self::Plosive | Self::Stop)
    }
}

const PLOSIVE: &[&str] = &["p", "b", "m"];
const STOP: &[&str] = &["k", "g", "t", "d"];
const FRICATIVE: &[&str] = &["s", "sh", "h", "f", "z", "j"];
const AFFRICATE: &[&str] = &["ch", "ts"];
const NASAL: &[&str] = &["n"];
const LIQUID: &[&str] = &["r"];
const GLIDE: &[&str] = &["w", "y"];

/// Classify a consonant symbol. Unknown symbols fall back to [`ConsonantClass::Other`].
pub fn classify(consonant: &str) -> ConsonantClass {
    const TABLE: &[(&[&str], ConsonantClass)] = &[
        (PLOSIVE, ConsonantClass::Plosive),
        (STOP, ConsonantClass::Stop),
        (FRICATIVE, ConsonantClass::Fricative),
        (AFFRICATE, ConsonantClass::Affricate),
        (NASAL, ConsonantClass::Nasal),
        (LIQUID, ConsonantClass::Liquid),
        (GLIDE, ConsonantClass::Glide),
    ];

    TABLE
        .iter()
        .find(|(symbols, _)| symbols.contains(&consonant))
        .map(|(_, class)| *class)
        .unwrap_or(ConsonantClass::Other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_full_inventory() {
        for c in ["p", "b", "m"] {
            assert_eq!(classify(c), ConsonantClass::Plosive, "{c}");
        }
        for c in ["k", "g", "t", "d"] {
            assert_eq!(classify(c), ConsonantClass::Stop, "{c}");
        }
        for c in ["s", "sh", "h", "f", "z", "j"] {
            assert_eq!(classify(c), ConsonantClass::Fricative, "{c}");
        }
        for c in ["ch", "ts"] {
            assert_eq!(classify(c), ConsonantClass::Affricate, "{c}");
        }
        assert_eq!(classify("n"), ConsonantClass::Nasal);
        assert_eq!(classify("r"), ConsonantClass::Liquid);
        assert_eq!(classify("w"), ConsonantClass::Glide);
        assert_eq!(classify("y"), ConsonantClass::Glide);
    }

    #[test]
    fn unknown_symbols_are_other() {
        assert_eq!(classify("ky"), ConsonantClass::Other);
        assert_eq!(classify(""), ConsonantClass::Other);
        assert_eq!(classify("P"), ConsonantClass::Other);
    }

    #[test]
    fn closure_classes() {
        assert!(ConsonantClass::Plosive.requires_closure());
        assert!(ConsonantClass::Stop.requires_closure());
        assert!(!ConsonantClass::Affricate.requires_closure());
        assert!(!ConsonantClass::Fricative.requires_closure());
    }
}
