use clap::{Parser, Subcommand};
use orbit_bench_core::config::{models_from_env_value, retrieval_model_from_env_value};
use orbit_bench_core::constants::DEFAULT_RETRIEVAL_PROMPT;
use orbit_bench_core::results::output_file_name;
use orbit_bench_core::{
    build_corpus, read_results, MatrixPlan, MetadataIndex, PromptCatalog, RetrievalSelection,
};
use orbit_types::NonEmptyText;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "orbit-bench")]
#[command(about = "Orbit Bench offline inspection CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the cases the corpus builder finds
    Cases {
        /// Root folder of case sub-folders
        cases_dir: PathBuf,
        /// Case index CSV
        case_index: PathBuf,
        /// Also print every image path
        #[arg(long)]
        images: bool,
    },
    /// List the prompt catalog
    Prompts {
        /// YAML prompt catalog (built-in prompts if omitted)
        #[arg(long)]
        prompts_file: Option<PathBuf>,
    },
    /// Show the configurations a run would evaluate and the files they write
    Plan {
        /// Comma-separated model ids
        #[arg(long)]
        models: Option<String>,
        /// YAML prompt catalog (built-in prompts if omitted)
        #[arg(long)]
        prompts_file: Option<PathBuf>,
        /// Include the file-search configuration
        #[arg(long)]
        file_search: bool,
        /// Model for the file-search configuration (defaults to the second model)
        #[arg(long)]
        retrieval_model: Option<String>,
        /// Prompt for the file-search configuration
        #[arg(long, default_value = DEFAULT_RETRIEVAL_PROMPT)]
        retrieval_prompt: String,
    },
    /// Summarise a result table
    Results {
        /// Result CSV written by a run
        path: PathBuf,
    },
}

fn load_catalog(prompts_file: Option<&Path>) -> Result<PromptCatalog, Box<dyn std::error::Error>> {
    Ok(match prompts_file {
        Some(path) => PromptCatalog::load(path)?,
        None => PromptCatalog::builtin(),
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Cases {
            cases_dir,
            case_index,
            images,
        }) => {
            let index = MetadataIndex::load(&case_index)?;
            let corpus = build_corpus(&cases_dir, &index)?;
            if corpus.is_empty() {
                println!("No cases found.");
            }
            for case in &corpus {
                println!(
                    "Case: {}, Diagnosis: {}, Images: {}",
                    case.case_id,
                    case.diagnosis,
                    case.images.len()
                );
                println!("  {}", case.clinical_info);
                if images {
                    for image in &case.images {
                        println!("  [{}] {}", image.label, image.path.display());
                    }
                }
            }
        }
        Some(Commands::Prompts { prompts_file }) => {
            let catalog = load_catalog(prompts_file.as_deref())?;
            for prompt in catalog.iter() {
                let first_line = prompt
                    .instruction_text
                    .as_str()
                    .lines()
                    .next()
                    .unwrap_or_default();
                println!("{}: {}", prompt.name, first_line);
            }
        }
        Some(Commands::Plan {
            models,
            prompts_file,
            file_search,
            retrieval_model,
            retrieval_prompt,
        }) => {
            let catalog = load_catalog(prompts_file.as_deref())?;
            let models = models_from_env_value(models)?;
            let selection = if file_search {
                Some(RetrievalSelection {
                    prompt: NonEmptyText::new(&retrieval_prompt)?,
                    model: retrieval_model_from_env_value(retrieval_model, &models)?,
                })
            } else {
                None
            };

            let plan = MatrixPlan::standard(&catalog, &models, selection.as_ref())?;
            for (i, config) in plan.configurations().iter().enumerate() {
                let name = config.name();
                println!("{:>2}. {} -> {}", i + 1, name, output_file_name(&name));
            }
        }
        Some(Commands::Results { path }) => {
            let rows = read_results(&path)?;
            let failed = rows.iter().filter(|r| r.is_failure()).count();
            println!(
                "Rows: {}, Answered: {}, Failed: {}",
                rows.len(),
                rows.len() - failed,
                failed
            );
        }
        None => {
            println!("Use 'orbit-bench --help' for commands");
        }
    }

    Ok(())
}
