use nalgebra::{Matrix3, Vector3};
use std::fmt;

/// Fractional tolerance used when merging symmetry-equivalent sites.
pub const SITE_TOLERANCE: f64 = 1e-4;

// ============================================================================
// SYMMETRY OPERATIONS
// ============================================================================

/// Affine operation on fractional coordinates: `r' = R r + t`.
#[derive(Debug, Clone, PartialEq)]
pub struct SymmetryOperation {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl SymmetryOperation {
    pub fn identity() -> Self {
        Self {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Parses the crystallographic "x,y,z" notation, e.g. `-y+1/2, x-y, z+1/2`.
    pub fn parse(op: &str) -> Result<Self, String> {
        let cleaned = op.replace(['\'', '"'], "");
        let parts: Vec<&str> = cleaned.split(',').collect();
        if parts.len() != 3 {
            return Err(format!("symmetry operation '{}' does not have three components", op));
        }

        let mut rotation = Matrix3::zeros();
        let mut translation = Vector3::zeros();
        for (row, expr) in parts.iter().enumerate() {
            let (coeffs, shift) = parse_component(expr)
                .ok_or_else(|| format!("cannot parse component '{}' of '{}'", expr.trim(), op))?;
            for (col, value) in coeffs.iter().enumerate() {
                rotation[(row, col)] = *value;
            }
            translation[row] = shift;
        }
        Ok(Self { rotation, translation })
    }

    pub fn apply(&self, frac: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * frac + self.translation
    }
}

/// Splits one component ("-x+y+1/2") into coefficients for (x, y, z) and a constant.
fn parse_component(expr: &str) -> Option<([f64; 3], f64)> {
    let s: String = expr.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    if s.is_empty() {
        return None;
    }

    let mut coeffs = [0.0; 3];
    let mut shift = 0.0;

    // Split by + or - but keep the sign with its term.
    let mut terms = Vec::new();
    let mut current = String::new();
    for c in s.chars() {
        if (c == '+' || c == '-') && !current.is_empty() {
            terms.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    terms.push(current);

    for term in terms {
        let (sign, body) = match term.strip_prefix('-') {
            Some(rest) => (-1.0, rest),
            None => (1.0, term.strip_prefix('+').unwrap_or(&term)),
        };
        if body.is_empty() {
            return None;
        }

        if let Some(axis) = body.chars().last().and_then(|c| "xyz".find(c)) {
            let factor = &body[..body.len() - 1];
            let factor = if factor.is_empty() { 1.0 } else { parse_number(factor.trim_end_matches('*'))? };
            coeffs[axis] += sign * factor;
        } else {
            shift += sign * parse_number(body)?;
        }
    }
    Some((coeffs, shift))
}

fn parse_number(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            if den == 0.0 { None } else { Some(num.parse::<f64>().ok()? / den) }
        }
        None => s.parse().ok(),
    }
}

impl fmt::Display for SymmetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let axes = ['x', 'y', 'z'];
        let mut parts = Vec::with_capacity(3);
        for row in 0..3 {
            let mut s = String::new();
            for (col, axis) in axes.iter().enumerate() {
                let v = self.rotation[(row, col)];
                if v.abs() < 1e-9 { continue; }
                if v < 0.0 { s.push('-'); } else if !s.is_empty() { s.push('+'); }
                s.push(*axis);
            }
            let t = self.translation[row];
            if t.abs() > 1e-9 {
                s.push_str(&format!("{:+}", t));
            }
            parts.push(s);
        }
        write!(f, "{}", parts.join(","))
    }
}

// ============================================================================
// SPACE GROUPS
// ============================================================================

/// Lattice centering translations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Centering {
    P,
    I,
    F,
}

impl Centering {
    pub fn translations(&self) -> Vec<Vector3<f64>> {
        match self {
            Centering::P => vec![Vector3::zeros()],
            Centering::I => vec![Vector3::zeros(), Vector3::new(0.5, 0.5, 0.5)],
            Centering::F => vec![
                Vector3::zeros(),
                Vector3::new(0.0, 0.5, 0.5),
                Vector3::new(0.5, 0.0, 0.5),
                Vector3::new(0.5, 0.5, 0.0),
            ],
        }
    }
}

const P63_MMC: [&str; 24] = [
    "x,y,z", "-y,x-y,z", "-x+y,-x,z", "-x,-y,z+1/2", "y,-x+y,z+1/2", "x-y,x,z+1/2",
    "y,x,-z", "x-y,-y,-z", "-x,-x+y,-z", "-y,-x,-z+1/2", "-x+y,y,-z+1/2", "x,x-y,-z+1/2",
    "-x,-y,-z", "y,-x+y,-z", "x-y,x,-z", "x,y,-z+1/2", "-y,x-y,-z+1/2", "-x+y,-x,-z+1/2",
    "-y,-x,z", "-x+y,y,z", "x,x-y,z", "y,x,z+1/2", "x-y,-y,z+1/2", "-x,-x+y,z+1/2",
];

const P63_MC: [&str; 12] = [
    "x,y,z", "-y,x-y,z", "-x+y,-x,z", "-x,-y,z+1/2", "y,-x+y,z+1/2", "x-y,x,z+1/2",
    "-y,-x,z", "-x+y,y,z", "x,x-y,z", "y,x,z+1/2", "x-y,-y,z+1/2", "-x,-x+y,z+1/2",
];

const P42_MNM: [&str; 16] = [
    "x,y,z", "-x,-y,z", "-y+1/2,x+1/2,z+1/2", "y+1/2,-x+1/2,z+1/2",
    "-x+1/2,y+1/2,-z+1/2", "x+1/2,-y+1/2,-z+1/2", "y,x,-z", "-y,-x,-z",
    "-x,-y,-z", "x,y,-z", "y+1/2,-x+1/2,-z+1/2", "-y+1/2,x+1/2,-z+1/2",
    "x+1/2,-y+1/2,z+1/2", "-x+1/2,y+1/2,z+1/2", "-y,-x,z", "y,x,z",
];

#[derive(Debug, Clone)]
pub struct SpaceGroup {
    pub number: u16,
    pub symbol: &'static str,
    /// Full operation list with centering translations folded in.
    pub operations: Vec<SymmetryOperation>,
}

impl SpaceGroup {
    /// Builds one of the space groups the structure generators rely on.
    pub fn from_number(number: u16) -> Result<Self, String> {
        let (symbol, point_ops, centering) = match number {
            221 => ("Pm-3m", cubic_ops(CubicSubgroup::Full, None), Centering::P),
            225 => ("Fm-3m", cubic_ops(CubicSubgroup::Full, None), Centering::F),
            229 => ("Im-3m", cubic_ops(CubicSubgroup::Full, None), Centering::I),
            216 => ("F-43m", cubic_ops(CubicSubgroup::Tetrahedral, None), Centering::F),
            // Origin choice 1: the improper coset carries a (1/4,1/4,1/4) shift.
            227 => ("Fd-3m", cubic_ops(CubicSubgroup::Full, Some(Vector3::repeat(0.25))), Centering::F),
            194 => ("P6_3/mmc", parse_table(&P63_MMC)?, Centering::P),
            186 => ("P6_3mc", parse_table(&P63_MC)?, Centering::P),
            136 => ("P4_2/mnm", parse_table(&P42_MNM)?, Centering::P),
            _ => return Err(format!("space group {} is not tabulated", number)),
        };

        let mut operations = Vec::with_capacity(point_ops.len() * 4);
        for t in centering.translations() {
            for op in &point_ops {
                operations.push(SymmetryOperation {
                    rotation: op.rotation,
                    translation: op.translation + t,
                });
            }
        }
        Ok(Self { number, symbol, operations })
    }

    /// Applies every operation to every basis site and keeps the distinct images in [0, 1).
    pub fn expand<S: Clone>(&self, basis: &[(S, Vector3<f64>)]) -> Vec<(S, Vector3<f64>)> {
        expand_sites(&self.operations, basis)
    }
}

/// Orbit expansion shared by space-group tables and CIF symmetry loops.
pub fn expand_sites<S: Clone>(operations: &[SymmetryOperation], basis: &[(S, Vector3<f64>)]) -> Vec<(S, Vector3<f64>)> {
    let mut sites: Vec<(S, Vector3<f64>)> = Vec::new();
    for (label, frac) in basis {
        for op in operations {
            let image = wrap_fractional(&op.apply(frac));
            let duplicate = sites.iter().any(|(_, existing)| same_site(existing, &image));
            if !duplicate {
                sites.push((label.clone(), image));
            }
        }
    }
    sites
}

/// Maps each coordinate into [0, 1), snapping values within tolerance of 1 back to 0.
pub fn wrap_fractional(frac: &Vector3<f64>) -> Vector3<f64> {
    frac.map(|x| {
        let w = x.rem_euclid(1.0);
        if (1.0 - w) < SITE_TOLERANCE || w < SITE_TOLERANCE { 0.0 } else { w }
    })
}

pub fn same_site(a: &Vector3<f64>, b: &Vector3<f64>) -> bool {
    let d = a - b;
    d.iter().all(|x| (x - x.round()).abs() < SITE_TOLERANCE)
}

fn parse_table(ops: &[&str]) -> Result<Vec<SymmetryOperation>, String> {
    ops.iter().map(|op| SymmetryOperation::parse(op)).collect()
}

#[derive(Clone, Copy)]
enum CubicSubgroup {
    /// m-3m, all 48 signed permutations.
    Full,
    /// -43m, signed permutations with an even number of sign flips.
    Tetrahedral,
}

/// Point operations of the cubic holohedry as signed permutation matrices.
///
/// With `improper_shift`, operations outside -43m receive that translation
/// (diamond-glide groups in origin choice 1).
fn cubic_ops(subgroup: CubicSubgroup, improper_shift: Option<Vector3<f64>>) -> Vec<SymmetryOperation> {
    const PERMUTATIONS: [[usize; 3]; 6] = [[0, 1, 2], [1, 2, 0], [2, 0, 1], [1, 0, 2], [0, 2, 1], [2, 1, 0]];
    let mut ops = Vec::with_capacity(48);

    for perm in PERMUTATIONS.iter() {
        for signs in 0..8u8 {
            let s = [
                if signs & 1 == 0 { 1.0 } else { -1.0 },
                if signs & 2 == 0 { 1.0 } else { -1.0 },
                if signs & 4 == 0 { 1.0 } else { -1.0 },
            ];
            let tetrahedral = s[0] * s[1] * s[2] > 0.0;
            if matches!(subgroup, CubicSubgroup::Tetrahedral) && !tetrahedral {
                continue;
            }

            let mut rotation = Matrix3::zeros();
            for row in 0..3 {
                rotation[(row, perm[row])] = s[row];
            }
            let translation = match improper_shift {
                Some(shift) if !tetrahedral => shift,
                _ => Vector3::zeros(),
            };
            ops.push(SymmetryOperation { rotation, translation });
        }
    }
    ops
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_hexagonal_operation() {
        let op = SymmetryOperation::parse("-y+1/2, x-y, z+1/2").unwrap();
        let image = op.apply(&Vector3::new(0.1, 0.2, 0.3));
        assert_relative_eq!(image, Vector3::new(0.3, -0.1, 0.8), epsilon = 1e-12);
    }

    #[test]
    fn rejects_malformed_operation() {
        assert!(SymmetryOperation::parse("x,y").is_err());
        assert!(SymmetryOperation::parse("x,y,q").is_err());
    }

    #[test]
    fn group_orders() {
        assert_eq!(SpaceGroup::from_number(225).unwrap().operations.len(), 192);
        assert_eq!(SpaceGroup::from_number(216).unwrap().operations.len(), 96);
        assert_eq!(SpaceGroup::from_number(194).unwrap().operations.len(), 24);
        assert!(SpaceGroup::from_number(152).is_err());
    }

    #[test]
    fn diamond_orbit_has_eight_sites() {
        let group = SpaceGroup::from_number(227).unwrap();
        let sites = group.expand(&[("C", Vector3::zeros())]);
        assert_eq!(sites.len(), 8);
        assert!(sites.iter().any(|(_, p)| same_site(p, &Vector3::repeat(0.25))));
    }

    #[test]
    fn rutile_oxygen_orbit() {
        let group = SpaceGroup::from_number(136).unwrap();
        let sites = group.expand(&[("O", Vector3::new(0.305, 0.305, 0.0))]);
        assert_eq!(sites.len(), 4);
    }
}
