use lazy_static::lazy_static;
use std::collections::HashMap;

/// Element symbols in atomic-number order (H = index 0).
pub const ELEMENT_SYMBOLS: [&str; 118] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne",
    "Na", "Mg", "Al", "Si", "P", "S", "Cl", "Ar", "K", "Ca",
    "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn",
    "Ga", "Ge", "As", "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr",
    "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In", "Sn",
    "Sb", "Te", "I", "Xe", "Cs", "Ba", "La", "Ce", "Pr", "Nd",
    "Pm", "Sm", "Eu", "Gd", "Tb", "Dy", "Ho", "Er", "Tm", "Yb",
    "Lu", "Hf", "Ta", "W", "Re", "Os", "Ir", "Pt", "Au", "Hg",
    "Tl", "Pb", "Bi", "Po", "At", "Rn", "Fr", "Ra", "Ac", "Th",
    "Pa", "U", "Np", "Pu", "Am", "Cm", "Bk", "Cf", "Es", "Fm",
    "Md", "No", "Lr", "Rf", "Db", "Sg", "Bh", "Hs", "Mt", "Ds",
    "Rg", "Cn", "Nh", "Fl", "Mc", "Lv", "Ts", "Og",
];

lazy_static! {
    static ref SYMBOL_INDEX: HashMap<String, &'static str> = ELEMENT_SYMBOLS
        .iter()
        .map(|s| (s.to_lowercase(), *s))
        .collect();
}

/// Case-insensitive lookup returning the canonical symbol ("SI" -> "Si").
pub fn normalize_symbol(symbol: &str) -> Option<&'static str> {
    SYMBOL_INDEX.get(&symbol.trim().to_lowercase()).copied()
}

pub fn is_element(symbol: &str) -> bool {
    normalize_symbol(symbol).is_some()
}

/// Strips labels such as "Fe1", "O2-" or "Si_a" down to an element symbol.
pub fn symbol_from_label(label: &str) -> Option<&'static str> {
    let letters: String = label.chars().take_while(|c| c.is_ascii_alphabetic()).collect();
    if letters.is_empty() {
        return None;
    }
    // "Co" beats "C" when both would parse.
    if letters.len() >= 2 {
        if let Some(sym) = normalize_symbol(&letters[..2]) {
            return Some(sym);
        }
    }
    normalize_symbol(&letters[..1])
}

/// Splits a formula such as "SiO2" or "BaTiO3" into its element symbols in order.
/// Returns `None` when any token is not a real element.
pub fn split_formula(formula: &str) -> Option<Vec<(&'static str, u32)>> {
    let mut parts = Vec::new();
    let chars: Vec<char> = formula.trim().chars().collect();
    let mut i = 0;

    while i < chars.len() {
        if !chars[i].is_ascii_uppercase() {
            return None;
        }
        let mut symbol = chars[i].to_string();
        i += 1;
        if i < chars.len() && chars[i].is_ascii_lowercase() {
            symbol.push(chars[i]);
            i += 1;
        }
        let mut digits = String::new();
        while i < chars.len() && chars[i].is_ascii_digit() {
            digits.push(chars[i]);
            i += 1;
        }
        let count = if digits.is_empty() { 1 } else { digits.parse().ok()? };
        let canonical = ELEMENT_SYMBOLS.iter().find(|s| **s == symbol)?;
        parts.push((*canonical, count));
    }

    if parts.is_empty() { None } else { Some(parts) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_case() {
        assert_eq!(normalize_symbol("SI"), Some("Si"));
        assert_eq!(normalize_symbol("cl"), Some("Cl"));
        assert_eq!(normalize_symbol("Xx99"), None);
    }

    #[test]
    fn cleans_cif_labels() {
        assert_eq!(symbol_from_label("Fe1"), Some("Fe"));
        assert_eq!(symbol_from_label("O2-"), Some("O"));
        assert_eq!(symbol_from_label("Co3"), Some("Co"));
        assert_eq!(symbol_from_label("C12"), Some("C"));
    }

    #[test]
    fn splits_formulas() {
        assert_eq!(split_formula("SiO2"), Some(vec![("Si", 1), ("O", 2)]));
        assert_eq!(split_formula("BaTiO3"), Some(vec![("Ba", 1), ("Ti", 1), ("O", 3)]));
        assert_eq!(split_formula("Xx"), None);
        assert_eq!(split_formula("nacl"), None);
    }
}
