use crate::chemistry::database::{KnowledgeEntry, LatticeDatabase};
use std::collections::BTreeSet;

/// Ways an explicit element list can be matched against compound keys.
///
/// [`CompoundMatchStrategy::ORDER`] is the evaluation order: each strategy scans
/// the whole compound table (in table order) before the next one is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundMatchStrategy {
    /// Key equals the ordered concatenation: ["Na", "Cl"] -> "nacl".
    ExactFormula,
    /// Key is the ordered concatenation followed by digits: ["Si", "O"] -> "sio2".
    FormulaWithCounts,
    /// Key equals the alphabetically sorted concatenation: ["O", "Mg"] -> "mgo".
    SortedSymbols,
    /// Entry declares exactly the requested element set, in any order.
    ElementSet,
    /// Entry declares every requested element, possibly alongside others.
    Containment,
}

impl CompoundMatchStrategy {
    pub const ORDER: [CompoundMatchStrategy; 5] = [
        Self::ExactFormula,
        Self::FormulaWithCounts,
        Self::SortedSymbols,
        Self::ElementSet,
        Self::Containment,
    ];

    fn matches(&self, entry: &KnowledgeEntry, symbols: &[String]) -> bool {
        let concatenated: String = symbols.concat();
        let declared = || entry.elements.iter().map(|e| e.to_lowercase()).collect::<BTreeSet<String>>();
        match self {
            Self::ExactFormula => entry.key == concatenated,
            Self::FormulaWithCounts => entry
                .key
                .strip_prefix(concatenated.as_str())
                .map(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(false),
            Self::SortedSymbols => {
                let mut sorted = symbols.to_vec();
                sorted.sort();
                entry.key == sorted.concat()
            }
            Self::ElementSet => {
                let wanted: BTreeSet<String> = symbols.iter().cloned().collect();
                wanted == declared()
            }
            // Element tokens, not substrings: "s" must not hit "inas".
            Self::Containment => {
                let declared = declared();
                symbols.iter().all(|s| declared.contains(s))
            }
        }
    }
}

/// Finds the compound entry for an explicit element list, reporting which strategy hit.
pub fn match_compound<'a, S: AsRef<str>>(
    db: &'a LatticeDatabase,
    elements: &[S],
) -> Option<(&'a KnowledgeEntry, CompoundMatchStrategy)> {
    let symbols: Vec<String> = elements
        .iter()
        .map(|e| e.as_ref().trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    if symbols.is_empty() {
        return None;
    }

    CompoundMatchStrategy::ORDER.iter().find_map(|strategy| {
        db.compounds()
            .iter()
            .find(|entry| strategy.matches(entry, &symbols))
            .map(|entry| (entry, *strategy))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_for(elements: &[&str]) -> Option<(String, CompoundMatchStrategy)> {
        match_compound(LatticeDatabase::global(), elements).map(|(e, s)| (e.key.clone(), s))
    }

    #[test]
    fn exact_formula_wins_first() {
        assert_eq!(key_for(&["Na", "Cl"]), Some(("nacl".into(), CompoundMatchStrategy::ExactFormula)));
    }

    #[test]
    fn numeric_suffix_beats_loose_containment() {
        // "tio" is contained in "catio3", which precedes "tio2" in the table.
        assert_eq!(key_for(&["Ti", "O"]), Some(("tio2".into(), CompoundMatchStrategy::FormulaWithCounts)));
        assert_eq!(key_for(&["Ba", "Ti", "O"]), Some(("batio3".into(), CompoundMatchStrategy::FormulaWithCounts)));
    }

    #[test]
    fn sorted_symbols_before_element_set() {
        assert_eq!(key_for(&["O", "Mg"]), Some(("mgo".into(), CompoundMatchStrategy::SortedSymbols)));
    }

    #[test]
    fn element_set_ignores_order() {
        assert_eq!(key_for(&["Cl", "Na"]), Some(("nacl".into(), CompoundMatchStrategy::ElementSet)));
        assert_eq!(key_for(&["O", "Si"]), Some(("sio2".into(), CompoundMatchStrategy::ElementSet)));
    }

    #[test]
    fn containment_compares_element_tokens() {
        assert_eq!(key_for(&["S", "I"]), None);
        assert_eq!(key_for(&["N", "O"]), None);
        assert_eq!(key_for(&["C", "O"]), None);
        assert_eq!(key_for(&["Ca", "O"]), Some(("catio3".into(), CompoundMatchStrategy::Containment)));
    }

    #[test]
    fn unknown_pair_has_no_match() {
        assert_eq!(key_for(&["Xe", "Rn"]), None);
    }
}
