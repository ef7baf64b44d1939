use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crystal_structure_generator::{
    check_dims, structure_report, writer, Crystal, LatticeDatabase, MockFoundationModel, ParameterExtractor, Provider,
    ProviderParams, SourceParams, SourceResolver, SourceType, StructureFamily, StructureFormat, StructureRequest,
    StructureSynthesizer, SynthesisError,
};
use crystal_structure_generator::config::{FetchConfig, LlmConfig};

#[derive(Parser)]
#[command(author, version, about = "Crystal Structure Generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Builds a structure from the built-in lattice knowledge base.
    Build {
        /// Element symbol, formula or name ("Si", "NaCl", "rock salt").
        material: String,

        /// Structure family override (fcc, bcc, sc, diamond, hcp, rocksalt, ...).
        #[arg(long = "type")]
        structure_type: Option<StructureFamily>,

        /// Primary lattice constant a (Å).
        #[arg(long)]
        lattice: Option<f64>,

        /// Ordered element list for compounds, e.g. "Ga,As".
        #[arg(long, value_delimiter = ',')]
        compound: Option<Vec<String>>,

        /// Supercell repetitions, e.g. 2x2x2.
        #[arg(long, value_parser = parse_dims, default_value = "1x1x1")]
        supercell: [usize; 3],

        /// Output file (.xyz, .cif or POSCAR/.vasp).
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Loads a structure from Materials Project, COD, ICSD, a file, a URL or inline text.
    Fetch {
        /// Database id, path, glob pattern, URL, inline structure text or material name.
        source: String,

        /// auto, mp, cod, icsd, file, url or string.
        #[arg(long, default_value = "auto")]
        source_type: SourceType,

        /// Input format for file, URL and string sources (cif, vasp, xyz).
        #[arg(long)]
        format: Option<StructureFormat>,

        #[arg(long)]
        api_key: Option<String>,

        #[arg(long)]
        username: Option<String>,

        #[arg(long)]
        password: Option<String>,

        #[arg(long, value_parser = parse_dims)]
        supercell: Option<[usize; 3]>,

        /// Output file; for glob patterns, a directory receiving one .xyz per match.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Extracts structure parameters from a description with an LLM and builds it.
    Describe {
        description: String,

        /// openai, anthropic, ollama or gemini.
        #[arg(long, default_value = "openai")]
        provider: Provider,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        api_key: Option<String>,

        /// Server address for ollama.
        #[arg(long)]
        base_url: Option<String>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Lists the knowledge base, or shows how a material would be resolved.
    Inspect {
        material: Option<String>,

        #[arg(long = "type")]
        structure_type: Option<StructureFamily>,

        #[arg(long, value_delimiter = ',')]
        compound: Option<Vec<String>>,
    },
}

fn parse_dims(s: &str) -> Result<[usize; 3], String> {
    let parts: Vec<&str> = s.split(['x', 'X', ',']).map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected NxNxN, got '{}'", s));
    }
    let mut dims = [1usize; 3];
    for (slot, part) in dims.iter_mut().zip(&parts) {
        *slot = part.parse().map_err(|_| format!("'{}' is not a positive integer", part))?;
    }
    check_dims(dims).map_err(|e| e.to_string())?;
    Ok(dims)
}

fn main() {
    pretty_env_logger::init();
    let cli = Cli::parse();
    let start_time = Instant::now();

    if let Err(e) = run(cli.command) {
        eprintln!("{}", describe_error(&e));
        std::process::exit(1);
    }
    println!("Done in {:.2?}", start_time.elapsed());
}

fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Build {
            material,
            structure_type,
            lattice,
            compound,
            supercell,
            output,
        } => {
            println!("--- Crystal Structure Generator ---");
            let mut request = StructureRequest::new(material).with_supercell(supercell);
            request.structure_type = structure_type;
            request.lattice_parameter = lattice;
            request.compound = compound;

            let synthesis = StructureSynthesizer::new().synthesize_detailed(&request)?;
            println!(
                "Resolved '{}' via {} -> {} (a = {:.4} Å)",
                synthesis.plan.material, synthesis.plan.resolution, synthesis.plan.family, synthesis.plan.a
            );
            finish(&synthesis.crystal, output.as_deref(), &request.material_name)
        }

        Commands::Fetch {
            source,
            source_type,
            format,
            api_key,
            username,
            password,
            supercell,
            output,
        } => {
            println!("--- Crystal Structure Generator ---");
            let resolver = SourceResolver::new(FetchConfig::from_env());
            let params = SourceParams {
                api_key,
                username,
                password,
                format,
                dims: supercell,
                ..Default::default()
            };

            let is_pattern = source.contains(['*', '?', '[']);
            if is_pattern && matches!(source_type, SourceType::Auto | SourceType::File) {
                println!("Loading every structure matching {}...", source);
                let results = resolver.resolve_many(&source, &params)?;
                for (path, crystal) in &results {
                    println!("-> {:?}: {}", path, crystal);
                }
                if let Some(dir) = output {
                    std::fs::create_dir_all(&dir).with_context(|| format!("Could not create {:?}", dir))?;
                    for (path, crystal) in &results {
                        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
                        writer::write_structure(&dir.join(format!("{}.xyz", stem)), crystal, &stem)?;
                    }
                    println!("Wrote {} structures to {:?}", results.len(), dir);
                }
                return Ok(());
            }

            println!("Resolving {} ({})...", source, source_type);
            let crystal = resolver.resolve(&source, source_type, &params)?;
            finish(&crystal, output.as_deref(), &source)
        }

        Commands::Describe {
            description,
            provider,
            model,
            api_key,
            base_url,
            output,
        } => {
            println!("--- Crystal Structure Generator ---");
            println!("Asking {} to interpret the description...", provider);
            let extractor = ParameterExtractor::new(LlmConfig::from_env());
            let params = ProviderParams { api_key, model, base_url };

            let request = extractor.extract(&description, provider, &params)?;
            println!(
                "-> material: {} | type: {} | a: {} | supercell: {:?} | compound: {:?}",
                request.material_name,
                request.structure_type.map(|f| f.to_string()).unwrap_or_else(|| "auto".into()),
                request.lattice_parameter.map(|a| format!("{:.4} Å", a)).unwrap_or_else(|| "default".into()),
                request.supercell_dims,
                request.compound,
            );
            let crystal = StructureSynthesizer::new().synthesize(&request)?;
            finish(&crystal, output.as_deref(), &request.material_name)
        }

        Commands::Inspect {
            material,
            structure_type,
            compound,
        } => {
            let Some(material) = material else {
                print_knowledge_base(LatticeDatabase::global());
                return Ok(());
            };
            let mut request = StructureRequest::new(material);
            request.structure_type = structure_type;
            request.compound = compound;

            let plan = StructureSynthesizer::new().plan(&request)?;
            println!("--- Resolution ---");
            println!("• Material:   {}", plan.material);
            println!("• Via:        {}", plan.resolution);
            println!("• Family:     {} ({} atoms per cell)", plan.family, plan.family.canonical_atom_count());
            println!("• Elements:   {}", plan.elements.join(", "));
            println!("• a:          {:.4} Å", plan.a);
            if let Some(c) = plan.c {
                println!("• c:          {:.4} Å", c);
            }
            Ok(())
        }
    }
}

fn finish(crystal: &Crystal, output: Option<&Path>, title: &str) -> Result<()> {
    let (_, report) = structure_report(crystal, &MockFoundationModel);
    println!("\nSuccess!");
    println!("{}", report);

    if let Some(path) = output {
        if path.is_dir() {
            bail!("{:?} is a directory; give a file name ending in .xyz, .cif or .vasp", path);
        }
        println!("Writing output to {:?}...", path);
        let format = writer::write_structure(path, crystal, title)?;
        println!("-> Wrote {} atoms as {}.", crystal.n_atoms(), format);
    }
    Ok(())
}

fn print_knowledge_base(db: &LatticeDatabase) {
    println!("--- Elements ---");
    for entry in db.elements() {
        println!("{:<6} {:<13} a={:<7.3} {}", entry.elements.join(""), entry.family, entry.a, entry.display_name);
    }
    println!("\n--- Compounds ---");
    for entry in db.compounds() {
        let c = entry.c.map(|c| format!(" c={:.3}", c)).unwrap_or_default();
        println!(
            "{:<18} {:<13} a={:.3}{:<9} {}",
            entry.key, entry.family, entry.a, c, entry.display_name
        );
    }
}

/// Error text with its taxonomy kind; remote failures are worded as connectivity problems.
fn describe_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<SynthesisError>() {
        Some(e) if e.is_connectivity() => {
            let hint = if e.is_retryable() { " Retrying may help." } else { "" };
            format!("Connection problem [{:?}]: {}.{}", e.kind(), e, hint)
        }
        Some(e) => format!("Error [{:?}]: {}", e.kind(), e),
        None => format!("Error: {:#}", error),
    }
}
