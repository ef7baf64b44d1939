use crate::chemistry::elements::{normalize_symbol, symbol_from_label};
use crate::core::structure::{Atom, Crystal, Lattice};
use crate::math::symmetry::{expand_sites, SymmetryOperation};
use anyhow::{anyhow, bail, Context, Result};
use nalgebra::Vector3;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Vacuum added on each side of a molecule read from plain XYZ (Å).
pub const XYZ_BOX_PADDING: f64 = 10.0;

/// Text formats the readers understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructureFormat {
    Cif,
    Poscar,
    Xyz,
}

impl StructureFormat {
    /// Guesses the format from a file name, path or URL; CIF when nothing matches.
    pub fn detect(name: &str) -> Self {
        let lower = name.trim().to_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or(&lower);
        let file_name = lower.rsplit(['/', '\\']).next().unwrap_or(lower);

        if file_name.ends_with(".xyz") || file_name.ends_with(".extxyz") {
            Self::Xyz
        } else if file_name.ends_with(".vasp")
            || file_name.contains("poscar")
            || file_name.contains("contcar")
        {
            Self::Poscar
        } else {
            Self::Cif
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Cif => "cif",
            Self::Poscar => "vasp",
            Self::Xyz => "xyz",
        }
    }
}

impl fmt::Display for StructureFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for StructureFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cif" => Ok(Self::Cif),
            "vasp" | "poscar" | "contcar" => Ok(Self::Poscar),
            "xyz" | "extxyz" => Ok(Self::Xyz),
            other => Err(format!("unknown structure format '{}'", other)),
        }
    }
}

/// Parses structure text in the given format.
pub fn parse_str(text: &str, format: StructureFormat) -> Result<Crystal> {
    match format {
        StructureFormat::Cif => parse_cif(text),
        StructureFormat::Poscar => parse_poscar(text),
        StructureFormat::Xyz => parse_xyz(text),
    }
}

/// Reads a structure file, choosing the format from its name.
pub fn from_file(path: &Path) -> Result<Crystal> {
    let contents = fs::read_to_string(path).with_context(|| format!("Could not read structure file: {:?}", path))?;
    let format = StructureFormat::detect(&path.to_string_lossy());
    parse_str(&contents, format).with_context(|| format!("Could not parse {:?} as {}", path, format))
}

// ============================================================================
// CIF
// ============================================================================

/// Parses a float value from a CIF string, removing uncertainty parentheses.
/// Example: "1.234(5)" -> 1.234
fn parse_cif_float(s: &str) -> Result<f64> {
    let clean_s = s.split('(').next().unwrap_or(s);
    clean_s.parse::<f64>().with_context(|| format!("Failed to parse '{}' as float", s))
}

const SYMOP_TAGS: [&str; 2] = ["_symmetry_equiv_pos_as_xyz", "_space_group_symop_operation_xyz"];

/// Parses the first data block of a CIF.
///
/// Handles cell parameters, the atom-site loop (type symbol or label) and the
/// symmetry-operation loop. Asymmetric-unit atoms are expanded with the listed
/// operations; without a symmetry loop the file is read as P1.
pub fn parse_cif(text: &str) -> Result<Crystal> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect();

    let mut lattice_params: HashMap<&str, f64> = HashMap::new();
    let mut basis: Vec<(String, Vector3<f64>)> = Vec::new();
    let mut operations: Vec<SymmetryOperation> = Vec::new();
    let mut seen_block = false;

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];

        if line.starts_with("data_") {
            if seen_block {
                log::debug!("CIF holds several data blocks; reading only the first");
                break;
            }
            seen_block = true;
        } else if line.starts_with("_cell_") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 2 {
                if let Ok(value) = parse_cif_float(parts[1]) {
                    lattice_params.insert(parts[0], value);
                }
            }
        } else if line.starts_with("loop_") {
            i += 1;

            let mut headers = Vec::new();
            while i < lines.len() && lines[i].starts_with('_') {
                headers.push(lines[i].split_whitespace().next().unwrap_or(lines[i]));
                i += 1;
            }

            let start = i;
            while i < lines.len() && !is_section_start(lines[i]) {
                i += 1;
            }
            let rows = &lines[start..i];

            if headers.contains(&"_atom_site_fract_x") {
                basis.extend(parse_atom_site_loop(&headers, rows)?);
            } else if let Some(op_col) = headers.iter().position(|h| SYMOP_TAGS.contains(h)) {
                for row in rows {
                    let op = symop_from_row(row, op_col, headers.len());
                    let parsed = SymmetryOperation::parse(&op)
                        .map_err(|e| anyhow!(e))
                        .context("Invalid CIF symmetry operation")?;
                    operations.push(parsed);
                }
            }
            // Step back one, as the outer loop increments i
            i -= 1;
        }
        i += 1;
    }

    let get_param = |key: &str| -> Result<f64> {
        lattice_params.get(key).copied().ok_or_else(|| anyhow!("CIF missing tag: {}", key))
    };

    let a = get_param("_cell_length_a")?;
    let b = get_param("_cell_length_b")?;
    let c = get_param("_cell_length_c")?;
    let alpha = get_param("_cell_angle_alpha")?;
    let beta = get_param("_cell_angle_beta")?;
    let gamma = get_param("_cell_angle_gamma")?;

    let lattice = Lattice::from_parameters(a, b, c, alpha, beta, gamma).map_err(|e| anyhow!(e))?;

    if basis.is_empty() {
        return Err(anyhow!("No atoms found in CIF file."));
    }
    if operations.is_empty() {
        operations.push(SymmetryOperation::identity());
    }

    let atoms = expand_sites(&operations, &basis)
        .into_iter()
        .map(|(element, frac)| Atom::new(element, frac))
        .collect();
    Ok(Crystal::new(lattice, atoms))
}

fn is_section_start(line: &str) -> bool {
    line.starts_with('_') || line.starts_with("loop_") || line.starts_with("data_") || line.starts_with(';')
}

fn parse_atom_site_loop(headers: &[&str], rows: &[&str]) -> Result<Vec<(String, Vector3<f64>)>> {
    let column = |tag: &str| headers.iter().position(|&h| h == tag);

    let symbol_idx = column("_atom_site_type_symbol")
        .or_else(|| column("_atom_site_label"))
        .context("CIF missing '_atom_site_type_symbol' and '_atom_site_label'")?;
    let x_idx = column("_atom_site_fract_x").context("CIF missing '_atom_site_fract_x'")?;
    let y_idx = column("_atom_site_fract_y").context("CIF missing '_atom_site_fract_y'")?;
    let z_idx = column("_atom_site_fract_z").context("CIF missing '_atom_site_fract_z'")?;
    let max_idx = symbol_idx.max(x_idx).max(y_idx).max(z_idx);

    let mut sites = Vec::new();
    for row in rows {
        let parts: Vec<&str> = row.split_whitespace().collect();
        if parts.len() <= max_idx {
            continue;
        }
        let label = parts[symbol_idx].trim_matches(|c| c == '\'' || c == '"');
        let element = symbol_from_label(label).with_context(|| format!("CIF atom label '{}' has no element symbol", label))?;
        let x = parse_cif_float(parts[x_idx])?;
        let y = parse_cif_float(parts[y_idx])?;
        let z = parse_cif_float(parts[z_idx])?;
        sites.push((element.to_string(), Vector3::new(x, y, z)));
    }
    Ok(sites)
}

/// Pulls the "x,y,z" expression out of a symmetry-loop row such as `1 'x, y, z'`.
fn symop_from_row(row: &str, op_col: usize, n_cols: usize) -> String {
    if let (Some(open), Some(close)) = (row.find(['\'', '"']), row.rfind(['\'', '"'])) {
        if close > open {
            return row[open + 1..close].to_string();
        }
    }
    if n_cols > 1 && op_col > 0 {
        // Unquoted "1 x,y,z": drop the leading id column.
        if let Some((first, rest)) = row.split_once(char::is_whitespace) {
            if first.parse::<usize>().is_ok() {
                return rest.trim().to_string();
            }
        }
    }
    row.to_string()
}

// ============================================================================
// POSCAR / VASP
// ============================================================================

/// Parses POSCAR/CONTCAR text (VASP 4 and 5 layouts, Direct or Cartesian).
pub fn parse_poscar(text: &str) -> Result<Crystal> {
    let mut lines = text.lines();
    let mut next_line = |what: &str| next_poscar_line(&mut lines, what);

    let comment = next_line("the comment line")?;
    let scale: f64 = next_line("the scale factor")?
        .split_whitespace()
        .next()
        .context("POSCAR scale line is empty")?
        .parse()
        .context("Invalid POSCAR scale factor")?;

    let mut rows = [[0.0; 3]; 3];
    for row in rows.iter_mut() {
        let values = parse_floats(next_line("the lattice vectors")?, 3).context("Invalid POSCAR lattice line")?;
        row.copy_from_slice(&values[..3]);
    }
    let raw = Lattice::from_rows(rows).map_err(|e| anyhow!(e))?;
    // A negative scale is the target cell volume.
    let factor = if scale < 0.0 { (scale.abs() / raw.volume()).cbrt() } else { scale };
    let lattice = Lattice::new(raw.matrix * factor).map_err(|e| anyhow!(e))?;

    // VASP 5 carries a species line before the counts; VASP 4 only in the comment.
    let line = next_line("the atom counts")?;
    let (species, counts_line): (Vec<String>, &str) = if line.starts_with(|c: char| c.is_ascii_alphabetic()) {
        (line.split_whitespace().map(str::to_string).collect(), next_line("the atom counts")?)
    } else {
        (comment.split_whitespace().map(str::to_string).collect(), line)
    };
    let counts: Vec<usize> = counts_line
        .split_whitespace()
        .map(|c| c.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .context("Invalid POSCAR atom counts")?;
    if species.len() < counts.len() {
        bail!("POSCAR lists {} atom counts but only {} species names", counts.len(), species.len());
    }

    let mut mode = next_line("the coordinate mode")?;
    if mode.to_lowercase().starts_with('s') {
        mode = next_line("the coordinate mode")?;
    }
    let cartesian = mode.to_lowercase().starts_with(['c', 'k']);

    let mut atoms = Vec::new();
    for (name, &count) in species.iter().zip(&counts) {
        let element = symbol_from_label(name).with_context(|| format!("POSCAR species '{}' is not an element", name))?;
        for _ in 0..count {
            let values = parse_floats(next_line("all atom positions")?, 3).context("Invalid POSCAR position line")?;
            let v = Vector3::new(values[0], values[1], values[2]);
            let frac = if cartesian { lattice.to_fractional(&(v * factor)) } else { v };
            atoms.push(Atom::new(element, frac));
        }
    }

    if atoms.is_empty() {
        return Err(anyhow!("No atoms found in POSCAR."));
    }
    Ok(Crystal::new(lattice, atoms))
}

fn next_poscar_line<'a>(lines: &mut std::str::Lines<'a>, what: &str) -> Result<&'a str> {
    lines.next().map(str::trim).with_context(|| format!("POSCAR ended before {}", what))
}

fn parse_floats(line: &str, n: usize) -> Result<Vec<f64>> {
    let values: Vec<f64> = line
        .split_whitespace()
        .take(n)
        .map(|v| v.parse::<f64>().with_context(|| format!("Failed to parse '{}' as float", v)))
        .collect::<Result<_>>()?;
    if values.len() < n {
        bail!("expected {} numbers in '{}'", n, line);
    }
    Ok(values)
}

// ============================================================================
// XYZ
// ============================================================================

/// Parses plain or extended XYZ.
///
/// With a `Lattice="ax ay az bx by bz cx cy cz"` comment the cell and `pbc`
/// flags are taken from it (`pbc` defaults to periodic). Without one, the atoms
/// are placed in a non-periodic orthogonal box padded by [`XYZ_BOX_PADDING`].
pub fn parse_xyz(text: &str) -> Result<Crystal> {
    let mut lines = text.lines();

    let n_atoms: usize = lines
        .next()
        .context("Empty XYZ file")?
        .trim()
        .parse()
        .context("Invalid XYZ atom count")?;
    let comment = lines.next().unwrap_or("");

    let mut sites = Vec::with_capacity(n_atoms);
    for line in lines.filter(|l| !l.trim().is_empty()).take(n_atoms) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 4 {
            bail!("XYZ atom line '{}' needs a symbol and three coordinates", line.trim());
        }
        let element = normalize_symbol(parts[0])
            .or_else(|| symbol_from_label(parts[0]))
            .with_context(|| format!("XYZ symbol '{}' is not an element", parts[0]))?;
        let pos = parse_floats(&parts[1..4].join(" "), 3)?;
        sites.push((element.to_string(), Vector3::new(pos[0], pos[1], pos[2])));
    }
    if sites.len() != n_atoms {
        bail!("XYZ header declares {} atoms but {} were found", n_atoms, sites.len());
    }

    let (lattice, periodic) = match quoted_value(comment, "Lattice") {
        Some(values) => {
            let v = parse_floats(&values, 9).context("Invalid extended-XYZ Lattice")?;
            let lattice = Lattice::from_rows([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]])
                .map_err(|e| anyhow!(e))?;
            let periodic = quoted_value(comment, "pbc").map(|p| parse_pbc(&p)).unwrap_or([true; 3]);
            (lattice, periodic)
        }
        None => (padded_box(&sites)?, [false; 3]),
    };

    Ok(Crystal::from_cartesian(lattice, sites, periodic))
}

/// Value of `key="..."` in an extended-XYZ comment line.
fn quoted_value(comment: &str, key: &str) -> Option<String> {
    let pattern = format!("{}=\"", key);
    let start = comment.find(&pattern)? + pattern.len();
    let end = comment[start..].find('"')?;
    Some(comment[start..start + end].to_string())
}

fn parse_pbc(flags: &str) -> [bool; 3] {
    let mut pbc = [true; 3];
    for (slot, flag) in pbc.iter_mut().zip(flags.split_whitespace()) {
        *slot = matches!(flag, "T" | "t" | "True" | "true" | "1");
    }
    pbc
}

fn padded_box(sites: &[(String, Vector3<f64>)]) -> Result<Lattice> {
    let mut lo = Vector3::repeat(f64::INFINITY);
    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
    for (_, p) in sites {
        lo = lo.inf(p);
        hi = hi.sup(p);
    }
    let extent = if sites.is_empty() { Vector3::zeros() } else { hi - lo };
    let size = extent.add_scalar(2.0 * XYZ_BOX_PADDING);
    Lattice::orthorhombic(size.x, size.y, size.z).map_err(|e| anyhow!(e))
}
