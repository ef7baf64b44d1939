use std::fmt;
use std::str::FromStr;

/// Structure families the generators know how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureFamily {
    Fcc,
    Bcc,
    Sc,
    Diamond,
    Hcp,
    Rocksalt,
    Zincblende,
    Wurtzite,
    Perovskite,
    Rutile,
    Quartz,
    Cristobalite,
}

impl StructureFamily {
    pub const ALL: [StructureFamily; 12] = [
        Self::Fcc,
        Self::Bcc,
        Self::Sc,
        Self::Diamond,
        Self::Hcp,
        Self::Rocksalt,
        Self::Zincblende,
        Self::Wurtzite,
        Self::Perovskite,
        Self::Rutile,
        Self::Quartz,
        Self::Cristobalite,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Fcc => "fcc",
            Self::Bcc => "bcc",
            Self::Sc => "sc",
            Self::Diamond => "diamond",
            Self::Hcp => "hcp",
            Self::Rocksalt => "rocksalt",
            Self::Zincblende => "zincblende",
            Self::Wurtzite => "wurtzite",
            Self::Perovskite => "perovskite",
            Self::Rutile => "rutile",
            Self::Quartz => "quartz",
            Self::Cristobalite => "cristobalite",
        }
    }

    /// Atoms in the conventional cell this crate builds.
    pub fn canonical_atom_count(&self) -> usize {
        match self {
            Self::Fcc => 4,
            Self::Bcc => 2,
            Self::Sc => 1,
            Self::Diamond => 8,
            Self::Hcp => 2,
            Self::Rocksalt => 8,
            Self::Zincblende => 8,
            Self::Wurtzite => 4,
            Self::Perovskite => 5,
            Self::Rutile => 6,
            Self::Quartz => 3,
            Self::Cristobalite => 6,
        }
    }

    /// Inclusive range of distinct species the family accepts.
    pub fn element_range(&self) -> (usize, usize) {
        match self {
            Self::Fcc | Self::Bcc | Self::Sc | Self::Diamond | Self::Hcp => (1, 1),
            Self::Perovskite => (2, 3),
            _ => (2, 2),
        }
    }

    /// Default c/a ratio for families with an independent `c` axis.
    ///
    /// | family | c/a |
    /// |---|---|
    /// | hcp, wurtzite | 1.633 (ideal close packing, √(8/3)) |
    /// | rutile | 0.644 |
    /// | quartz | 1.10 |
    pub fn default_c_ratio(&self) -> Option<f64> {
        match self {
            Self::Hcp | Self::Wurtzite => Some(1.633),
            Self::Rutile => Some(0.644),
            Self::Quartz => Some(1.10),
            _ => None,
        }
    }

    pub fn is_hexagonal(&self) -> bool {
        matches!(self, Self::Hcp | Self::Wurtzite | Self::Quartz)
    }
}

impl fmt::Display for StructureFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for StructureFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect();
        let family = match key.as_str() {
            "fcc" | "facecenteredcubic" => Self::Fcc,
            "bcc" | "bodycenteredcubic" => Self::Bcc,
            "sc" | "simplecubic" | "cubic" => Self::Sc,
            "diamond" | "diamondcubic" => Self::Diamond,
            "hcp" | "hexagonalclosepacked" => Self::Hcp,
            "rocksalt" | "halite" | "b1" => Self::Rocksalt,
            "zincblende" | "sphalerite" | "b3" => Self::Zincblende,
            "wurtzite" | "b4" => Self::Wurtzite,
            "perovskite" => Self::Perovskite,
            "rutile" => Self::Rutile,
            "quartz" | "alphaquartz" => Self::Quartz,
            "cristobalite" => Self::Cristobalite,
            _ => return Err(format!("unknown structure type '{}'", s.trim())),
        };
        Ok(family)
    }
}
