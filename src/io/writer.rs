use crate::core::structure::Crystal;
use crate::io::parser::StructureFormat;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Extended XYZ: atom count, a comment line carrying `Lattice="..."` and
/// `pbc="..."`, then one `symbol x y z` line per atom in Cartesian Å.
///
/// Readers that ignore the comment line still get a plain XYZ atom list.
pub fn to_xyz_string(crystal: &Crystal, comment: Option<&str>) -> String {
    let m = &crystal.lattice.matrix;
    let lattice: Vec<String> = (0..3)
        .flat_map(|col| (0..3).map(move |row| (row, col)))
        .map(|(row, col)| format!("{:.8}", m[(row, col)]))
        .collect();
    let pbc: Vec<&str> = crystal.periodic.iter().map(|&p| if p { "T" } else { "F" }).collect();

    let mut header = format!(
        "Lattice=\"{}\" Properties=species:S:1:pos:R:3 pbc=\"{}\"",
        lattice.join(" "),
        pbc.join(" ")
    );
    if let Some(comment) = comment.map(str::trim).filter(|c| !c.is_empty()) {
        header.push(' ');
        header.push_str(&comment.replace(['\n', '\r'], " "));
    }

    let mut lines = vec![crystal.n_atoms().to_string(), header];
    lines.extend(
        crystal
            .atoms
            .iter()
            .zip(crystal.cartesian_positions())
            .map(|(atom, pos)| format!("{:<3} {:16.8} {:16.8} {:16.8}", atom.element, pos.x, pos.y, pos.z)),
    );
    join_lines(lines)
}

/// P1 CIF with every atom listed explicitly.
pub fn to_cif_string(crystal: &Crystal, data_name: &str) -> String {
    let (a, b, c, alpha, beta, gamma) = crystal.lattice.to_parameters();
    let block: String = data_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let mut lines = vec![
        format!("data_{}", if block.is_empty() { "structure" } else { block.as_str() }),
        format!("_chemical_formula_sum '{}'", crystal.formula()),
        format!("_cell_length_a {:.6}", a),
        format!("_cell_length_b {:.6}", b),
        format!("_cell_length_c {:.6}", c),
        format!("_cell_angle_alpha {:.6}", alpha),
        format!("_cell_angle_beta {:.6}", beta),
        format!("_cell_angle_gamma {:.6}", gamma),
        "_symmetry_space_group_name_H-M 'P 1'".to_string(),
        "loop_".to_string(),
        "_symmetry_equiv_pos_as_xyz".to_string(),
        "'x, y, z'".to_string(),
        "loop_".to_string(),
    ];
    lines.extend(
        ["_atom_site_label", "_atom_site_type_symbol", "_atom_site_fract_x", "_atom_site_fract_y", "_atom_site_fract_z"]
            .iter()
            .map(|tag| tag.to_string()),
    );
    lines.extend(crystal.atoms.iter().enumerate().map(|(i, atom)| {
        let f = atom.fractional_coords;
        format!("{}{} {} {:.8} {:.8} {:.8}", atom.element, i + 1, atom.element, f.x, f.y, f.z)
    }));
    join_lines(lines)
}

/// VASP 5 POSCAR in Direct coordinates, species grouped in first-appearance order.
pub fn to_poscar_string(crystal: &Crystal, comment: &str) -> String {
    let mut order: Vec<&str> = Vec::new();
    for atom in &crystal.atoms {
        if !order.contains(&atom.element.as_str()) {
            order.push(&atom.element);
        }
    }

    let title = if comment.trim().is_empty() { crystal.formula() } else { comment.trim().to_string() };
    let mut lines = vec![title, "1.0".to_string()];
    for axis in 0..3 {
        let v = crystal.lattice.vector(axis);
        lines.push(format!(" {:14.8} {:14.8} {:14.8}", v.x, v.y, v.z));
    }
    let counts: Vec<String> = order
        .iter()
        .map(|el| crystal.atoms.iter().filter(|a| a.element == *el).count().to_string())
        .collect();
    lines.push(format!(" {}", order.join(" ")));
    lines.push(format!(" {}", counts.join(" ")));
    lines.push("Direct".to_string());
    for el in &order {
        for atom in crystal.atoms.iter().filter(|a| a.element == *el) {
            let f = atom.fractional_coords;
            lines.push(format!(" {:14.8} {:14.8} {:14.8}", f.x, f.y, f.z));
        }
    }
    join_lines(lines)
}

fn join_lines(lines: Vec<String>) -> String {
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Renders `crystal` in `format`.
pub fn to_string(crystal: &Crystal, format: StructureFormat, title: &str) -> String {
    match format {
        StructureFormat::Xyz => to_xyz_string(crystal, Some(title)),
        StructureFormat::Cif => to_cif_string(crystal, title),
        StructureFormat::Poscar => to_poscar_string(crystal, title),
    }
}

/// Writes `crystal` to `path`, choosing the format from the file name.
pub fn write_structure(path: &Path, crystal: &Crystal, title: &str) -> Result<StructureFormat> {
    let format = StructureFormat::detect(&path.to_string_lossy());
    fs::write(path, to_string(crystal, format, title))
        .with_context(|| format!("Could not write structure file: {:?}", path))?;
    log::info!("wrote {} atoms to {:?} ({})", crystal.n_atoms(), path, format);
    Ok(format)
}
