//! Built-in lattice knowledge: known structure families and reference lattice
//! constants (Å) for common elements and compounds.
//!
//! The tables are assembled once on first access and are read-only afterwards,
//! so any number of threads may query them concurrently.

use crate::synthesis::family::StructureFamily;
use lazy_static::lazy_static;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeEntry {
    /// Lowercase lookup key ("al", "nacl", "sio2_cristobalite").
    pub key: String,
    pub family: StructureFamily,
    /// Species in generator order (A, B, anion ...).
    pub elements: Vec<&'static str>,
    /// Declared formula ratio, parallel to `elements`.
    pub stoichiometry: Vec<u32>,
    pub a: f64,
    pub c: Option<f64>,
    pub display_name: &'static str,
    /// Additional lowercase names that resolve to this entry.
    pub aliases: Vec<String>,
}

impl KnowledgeEntry {
    fn element(
        symbol: &'static str,
        family: StructureFamily,
        a: f64,
        c: Option<f64>,
        display_name: &'static str,
    ) -> Self {
        // Display names double as aliases ("silicon" -> Si).
        let alias = display_name.split(" (").next().unwrap_or(display_name);
        Self {
            key: symbol.to_lowercase(),
            family,
            elements: vec![symbol],
            stoichiometry: vec![1],
            a,
            c,
            display_name,
            aliases: vec![alias.to_lowercase()],
        }
    }

    fn compound(
        key: &'static str,
        family: StructureFamily,
        elements: &[&'static str],
        stoichiometry: &[u32],
        a: f64,
        c: Option<f64>,
        display_name: &'static str,
        aliases: &[&'static str],
    ) -> Self {
        Self {
            key: key.to_string(),
            family,
            elements: elements.to_vec(),
            stoichiometry: stoichiometry.to_vec(),
            a,
            c,
            display_name,
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Secondary constant, falling back to the family's tabulated c/a ratio.
    pub fn c_or_default(&self) -> Option<f64> {
        self.c.or_else(|| self.family.default_c_ratio().map(|r| r * self.a))
    }
}

// ============================================================================
// TABLES
// ============================================================================

fn element_table() -> Vec<KnowledgeEntry> {
    use StructureFamily::*;
    vec![
        // FCC
        KnowledgeEntry::element("Al", Fcc, 4.05, None, "Aluminum"),
        KnowledgeEntry::element("Ag", Fcc, 4.09, None, "Silver"),
        KnowledgeEntry::element("Au", Fcc, 4.08, None, "Gold"),
        KnowledgeEntry::element("Cu", Fcc, 3.61, None, "Copper"),
        KnowledgeEntry::element("Ni", Fcc, 3.52, None, "Nickel"),
        KnowledgeEntry::element("Pd", Fcc, 3.89, None, "Palladium"),
        KnowledgeEntry::element("Pt", Fcc, 3.92, None, "Platinum"),
        // BCC
        KnowledgeEntry::element("Fe", Bcc, 2.87, None, "Iron"),
        KnowledgeEntry::element("Cr", Bcc, 2.88, None, "Chromium"),
        KnowledgeEntry::element("Mo", Bcc, 3.15, None, "Molybdenum"),
        KnowledgeEntry::element("W", Bcc, 3.16, None, "Tungsten"),
        KnowledgeEntry::element("V", Bcc, 3.02, None, "Vanadium"),
        KnowledgeEntry::element("Nb", Bcc, 3.30, None, "Niobium"),
        KnowledgeEntry::element("Ta", Bcc, 3.31, None, "Tantalum"),
        // HCP
        KnowledgeEntry::element("Mg", Hcp, 3.21, Some(5.21), "Magnesium"),
        KnowledgeEntry::element("Ti", Hcp, 2.95, Some(4.68), "Titanium"),
        KnowledgeEntry::element("Zn", Hcp, 2.66, Some(4.95), "Zinc"),
        KnowledgeEntry::element("Co", Hcp, 2.51, Some(4.07), "Cobalt"),
        KnowledgeEntry::element("Zr", Hcp, 3.23, Some(5.15), "Zirconium"),
        KnowledgeEntry::element("Be", Hcp, 2.29, Some(3.58), "Beryllium"),
        // Diamond
        KnowledgeEntry::element("Si", Diamond, 5.43, None, "Silicon"),
        KnowledgeEntry::element("Ge", Diamond, 5.66, None, "Germanium"),
        KnowledgeEntry::element("C", Diamond, 3.57, None, "Carbon (Diamond)"),
        KnowledgeEntry::element("Sn", Diamond, 6.49, None, "Tin"),
        // Simple cubic
        KnowledgeEntry::element("Po", Sc, 3.35, None, "Polonium"),
    ]
}

fn compound_table() -> Vec<KnowledgeEntry> {
    use StructureFamily::*;
    vec![
        // Rocksalt
        KnowledgeEntry::compound("nacl", Rocksalt, &["Na", "Cl"], &[1, 1], 5.64, None, "Sodium Chloride", &["sodium chloride", "rock salt", "halite"]),
        KnowledgeEntry::compound("mgo", Rocksalt, &["Mg", "O"], &[1, 1], 4.21, None, "Magnesium Oxide", &["magnesium oxide", "magnesia"]),
        KnowledgeEntry::compound("lif", Rocksalt, &["Li", "F"], &[1, 1], 4.03, None, "Lithium Fluoride", &["lithium fluoride"]),
        KnowledgeEntry::compound("kcl", Rocksalt, &["K", "Cl"], &[1, 1], 6.29, None, "Potassium Chloride", &["potassium chloride", "sylvite"]),
        // Zincblende
        KnowledgeEntry::compound("zns", Zincblende, &["Zn", "S"], &[1, 1], 5.41, None, "Zinc Sulfide", &["zinc sulfide", "zinc sulphide", "sphalerite"]),
        KnowledgeEntry::compound("gan", Zincblende, &["Ga", "N"], &[1, 1], 4.52, None, "Gallium Nitride", &["gallium nitride"]),
        KnowledgeEntry::compound("gap", Zincblende, &["Ga", "P"], &[1, 1], 5.45, None, "Gallium Phosphide", &["gallium phosphide"]),
        KnowledgeEntry::compound("gaas", Zincblende, &["Ga", "As"], &[1, 1], 5.65, None, "Gallium Arsenide", &["gallium arsenide"]),
        KnowledgeEntry::compound("inas", Zincblende, &["In", "As"], &[1, 1], 6.06, None, "Indium Arsenide", &["indium arsenide"]),
        KnowledgeEntry::compound("cdte", Zincblende, &["Cd", "Te"], &[1, 1], 6.48, None, "Cadmium Telluride", &["cadmium telluride"]),
        // Wurtzite
        KnowledgeEntry::compound("zns_w", Wurtzite, &["Zn", "S"], &[1, 1], 3.82, Some(6.26), "Zinc Sulfide (Wurtzite)", &["wurtzite zinc sulfide", "zinc sulfide wurtzite"]),
        KnowledgeEntry::compound("zno", Wurtzite, &["Zn", "O"], &[1, 1], 3.25, Some(5.21), "Zinc Oxide", &["zinc oxide", "zincite"]),
        // Perovskite
        KnowledgeEntry::compound("catio3", Perovskite, &["Ca", "Ti", "O"], &[1, 1, 3], 3.84, None, "Calcium Titanate", &["calcium titanate"]),
        KnowledgeEntry::compound("batio3", Perovskite, &["Ba", "Ti", "O"], &[1, 1, 3], 4.00, None, "Barium Titanate", &["barium titanate"]),
        KnowledgeEntry::compound("srtio3", Perovskite, &["Sr", "Ti", "O"], &[1, 1, 3], 3.905, None, "Strontium Titanate", &["strontium titanate"]),
        // Rutile
        KnowledgeEntry::compound("tio2", Rutile, &["Ti", "O"], &[1, 2], 4.59, Some(2.96), "Titanium Dioxide", &["titanium dioxide", "titania"]),
        KnowledgeEntry::compound("sno2", Rutile, &["Sn", "O"], &[1, 2], 4.74, Some(3.19), "Tin Dioxide", &["tin dioxide", "cassiterite"]),
        // Silica polymorphs
        KnowledgeEntry::compound("sio2", Quartz, &["Si", "O"], &[1, 2], 4.91, Some(5.40), "Silicon Dioxide (Quartz)", &["silicon dioxide", "silica"]),
        KnowledgeEntry::compound("sio2_quartz", Quartz, &["Si", "O"], &[1, 2], 4.91, Some(5.40), "Silicon Dioxide (Quartz)", &["quartz", "alpha quartz"]),
        KnowledgeEntry::compound("sio2_cristobalite", Cristobalite, &["Si", "O"], &[1, 2], 7.16, None, "Silicon Dioxide (Cristobalite)", &["cristobalite"]),
    ]
}

// ============================================================================
// LOOKUP
// ============================================================================

#[derive(Debug)]
pub struct LatticeDatabase {
    elements: Vec<KnowledgeEntry>,
    compounds: Vec<KnowledgeEntry>,
    element_keys: HashMap<String, usize>,
    element_aliases: HashMap<String, usize>,
    compound_keys: HashMap<String, usize>,
    compound_aliases: HashMap<String, usize>,
}

lazy_static! {
    static ref DATABASE: LatticeDatabase = LatticeDatabase::build(element_table(), compound_table());
}

impl LatticeDatabase {
    /// The process-wide table set.
    pub fn global() -> &'static LatticeDatabase {
        &DATABASE
    }

    fn build(elements: Vec<KnowledgeEntry>, compounds: Vec<KnowledgeEntry>) -> Self {
        fn index(entries: &[KnowledgeEntry]) -> (HashMap<String, usize>, HashMap<String, usize>) {
            let mut keys = HashMap::new();
            let mut aliases = HashMap::new();
            for (i, entry) in entries.iter().enumerate() {
                keys.insert(entry.key.clone(), i);
                for alias in &entry.aliases {
                    // First entry wins when two entries share an alias.
                    aliases.entry(alias.clone()).or_insert(i);
                }
            }
            (keys, aliases)
        }

        let (element_keys, element_aliases) = index(&elements);
        let (compound_keys, compound_aliases) = index(&compounds);
        Self {
            elements,
            compounds,
            element_keys,
            element_aliases,
            compound_keys,
            compound_aliases,
        }
    }

    /// Case-insensitive; symbol first, then element name.
    pub fn lookup_element(&self, symbol: &str) -> Option<&KnowledgeEntry> {
        let key = normalize_key(symbol);
        self.element_keys
            .get(&key)
            .or_else(|| self.element_aliases.get(&key))
            .map(|&i| &self.elements[i])
    }

    /// Case-insensitive; formula key first, then chemical-name aliases.
    pub fn lookup_compound(&self, key: &str) -> Option<&KnowledgeEntry> {
        let key = normalize_key(key);
        self.compound_keys
            .get(&key)
            .or_else(|| self.compound_aliases.get(&key))
            .map(|&i| &self.compounds[i])
    }

    /// Compound entries in table order.
    pub fn compounds(&self) -> &[KnowledgeEntry] {
        &self.compounds
    }

    pub fn elements(&self) -> &[KnowledgeEntry] {
        &self.elements
    }
}

fn normalize_key(raw: &str) -> String {
    raw.trim().split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compound_lookup_tries_formula_then_alias() {
        let db = LatticeDatabase::global();
        assert_eq!(db.lookup_compound("NaCl").map(|e| e.key.as_str()), Some("nacl"));
        assert_eq!(db.lookup_compound("  Sodium   Chloride ").map(|e| e.key.as_str()), Some("nacl"));
        assert_eq!(db.lookup_compound("quartz").map(|e| e.key.as_str()), Some("sio2_quartz"));
        assert!(db.lookup_compound("unobtainium").is_none());
    }

    #[test]
    fn element_lookup_accepts_names() {
        let db = LatticeDatabase::global();
        assert_eq!(db.lookup_element("SI").map(|e| e.family), Some(StructureFamily::Diamond));
        assert_eq!(db.lookup_element("carbon").map(|e| e.key.as_str()), Some("c"));
        assert!(db.lookup_element("Xx").is_none());
    }
}
