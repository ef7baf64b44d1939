use nalgebra::{Matrix3, Vector3};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Periodic cell. Lattice vectors are stored as the *columns* of `matrix`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    pub matrix: Matrix3<f64>,
    pub reciprocal_matrix: Matrix3<f64>,
}

impl Lattice {
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, &'static str> {
        if !matrix.iter().all(|v| v.is_finite()) {
            return Err("Lattice contains non-finite values.");
        }
        if matrix.determinant().abs() < 1e-6 {
            return Err("Lattice has zero or near-zero volume.");
        }
        let reciprocal_matrix = matrix
            .try_inverse()
            .ok_or("Lattice is not invertible.")?
            .transpose();
        Ok(Self {
            matrix,
            reciprocal_matrix,
        })
    }

    pub fn cubic(a: f64) -> Result<Self, &'static str> {
        Self::new(Matrix3::from_diagonal_element(a))
    }

    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, &'static str> {
        Self::new(Matrix3::from_diagonal(&Vector3::new(a, b, c)))
    }

    /// Hexagonal cell (a, a, c, 90°, 90°, 120°) with `a` along x.
    pub fn hexagonal(a: f64, c: f64) -> Result<Self, &'static str> {
        Self::from_parameters(a, a, c, 90.0, 90.0, 120.0)
    }

    /// Builds the cell from lengths (Å) and angles (degrees), `a` along x and `b` in the xy-plane.
    pub fn from_parameters(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Result<Self, &'static str> {
        let alpha_r = alpha.to_radians();
        let beta_r = beta.to_radians();
        let gamma_r = gamma.to_radians();

        let term = 1.0 - alpha_r.cos().powi(2) - beta_r.cos().powi(2) - gamma_r.cos().powi(2)
            + 2.0 * alpha_r.cos() * beta_r.cos() * gamma_r.cos();

        if term <= 0.0 { return Err("Invalid lattice angles."); }

        let v_factor = term.sqrt();
        let matrix = Matrix3::new(
            a, b * gamma_r.cos(), c * beta_r.cos(),
            0.0, b * gamma_r.sin(), c * (alpha_r.cos() - beta_r.cos() * gamma_r.cos()) / gamma_r.sin(),
            0.0, 0.0, c * v_factor / gamma_r.sin(),
        );
        Self::new(matrix)
    }

    /// Builds the cell from three lattice vectors given as rows (file-format order).
    pub fn from_rows(rows: [[f64; 3]; 3]) -> Result<Self, &'static str> {
        let columns = [
            Vector3::from(rows[0]),
            Vector3::from(rows[1]),
            Vector3::from(rows[2]),
        ];
        Self::new(Matrix3::from_columns(&columns))
    }

    pub fn vector(&self, axis: usize) -> Vector3<f64> {
        self.matrix.column(axis).into_owned()
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    /// Cell with each lattice vector multiplied by the matching factor (factors >= 1).
    pub fn scaled(&self, factors: [usize; 3]) -> Self {
        let mut scaled = self.clone();
        for (axis, &n) in factors.iter().enumerate() {
            let n = n.max(1) as f64;
            let column = scaled.matrix.column(axis) * n;
            scaled.matrix.set_column(axis, &column);
            let column = scaled.reciprocal_matrix.column(axis) / n;
            scaled.reciprocal_matrix.set_column(axis, &column);
        }
        scaled
    }

    pub fn to_cartesian(&self, frac: &Vector3<f64>) -> Vector3<f64> { self.matrix * frac }
    pub fn to_fractional(&self, cart: &Vector3<f64>) -> Vector3<f64> { self.reciprocal_matrix.transpose() * cart }

    pub fn to_parameters(&self) -> (f64, f64, f64, f64, f64, f64) {
        let a = self.matrix.column(0).norm();
        let b = self.matrix.column(1).norm();
        let c = self.matrix.column(2).norm();
        let alpha = (self.matrix.column(1).dot(&self.matrix.column(2)) / (b * c)).acos().to_degrees();
        let beta = (self.matrix.column(0).dot(&self.matrix.column(2)) / (a * c)).acos().to_degrees();
        let gamma = (self.matrix.column(0).dot(&self.matrix.column(1)) / (a * b)).acos().to_degrees();
        (a, b, c, alpha, beta, gamma)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub element: String,
    pub fractional_coords: Vector3<f64>,
}

impl Atom {
    pub fn new(element: impl Into<String>, fractional_coords: Vector3<f64>) -> Self {
        Self {
            element: element.into(),
            fractional_coords,
        }
    }
}

/// The atomic structure every generator, parser and remote source normalises into.
///
/// Positions are always fractional with respect to `lattice`; Cartesian
/// coordinates (Å) are derived on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct Crystal {
    pub lattice: Lattice,
    pub atoms: Vec<Atom>,
    pub periodic: [bool; 3],
}

impl Crystal {
    pub fn new(lattice: Lattice, atoms: Vec<Atom>) -> Self {
        Self {
            lattice,
            atoms,
            periodic: [true; 3],
        }
    }

    /// Builds a structure from Cartesian positions (Å).
    pub fn from_cartesian(lattice: Lattice, atoms: Vec<(String, Vector3<f64>)>, periodic: [bool; 3]) -> Self {
        let atoms = atoms
            .into_iter()
            .map(|(element, cart)| {
                let frac = lattice.to_fractional(&cart);
                Atom::new(element, frac)
            })
            .collect();
        Self { lattice, atoms, periodic }
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }

    /// Element symbol per atom, in atom order.
    pub fn species(&self) -> Vec<&str> {
        self.atoms.iter().map(|a| a.element.as_str()).collect()
    }

    pub fn cartesian_positions(&self) -> Vec<Vector3<f64>> {
        self.atoms
            .iter()
            .map(|a| self.lattice.to_cartesian(&a.fractional_coords))
            .collect()
    }

    /// Atom count per element, ordered by symbol.
    pub fn species_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for atom in &self.atoms {
            *counts.entry(atom.element.clone()).or_insert(0) += 1;
        }
        counts
    }

    /// Reduced chemical formula in first-appearance order, e.g. "SiO2".
    pub fn formula(&self) -> String {
        let mut order: Vec<&str> = Vec::new();
        for atom in &self.atoms {
            if !order.contains(&atom.element.as_str()) {
                order.push(&atom.element);
            }
        }
        let counts = self.species_counts();
        let divisor = counts.values().copied().fold(0, gcd);

        order
            .iter()
            .map(|el| {
                let n = counts[*el] / divisor.max(1);
                if n == 1 { el.to_string() } else { format!("{}{}", el, n) }
            })
            .collect()
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 { a } else { gcd(b, a % b) }
}

impl fmt::Display for Crystal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (a, b, c, alpha, beta, gamma) = self.lattice.to_parameters();
        write!(
            f,
            "{} ({} atoms) | a={:.4} b={:.4} c={:.4} Å | α={:.2} β={:.2} γ={:.2}°",
            self.formula(),
            self.n_atoms(),
            a, b, c, alpha, beta, gamma
        )
    }
}
