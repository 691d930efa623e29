use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::error::Error;
use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use taxtools_rs::io::open_text;
use taxtools_rs::profiles::Classifier;
use taxtools_rs::sylph_taxonomy::{build_sylph_taxonomy, format_sylph_taxonomy};
use taxtools_rs::taxdb::TaxonomyGraph;
use taxtools_rs::{
    ancestors_report, canonical_ranks, run_extract, run_summarise, ExtractOptions, SummariseOptions,
};

#[derive(Parser)]
#[command(name = "taxtools-rs", version, about = "Resolve NCBI lineages and aggregate classifier profiles")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Aggregate classifier abundance profiles into a taxon x sample table
    Summarise {
        /// TSV samplesheet: sample, profile path
        #[arg(long)]
        samplesheet: PathBuf,
        /// Directory containing nodes.dmp and names.dmp
        #[arg(long, env = "TAXTOOLS_TAXONOMY")]
        taxonomy: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// kraken2, metabuli, metacache, diamond or sylph
        #[arg(long)]
        tool: Classifier,
        /// Also write a table summed up to this rank
        #[arg(long, default_value = "")]
        summarise_at: String,
    },
    /// List reads assigned to expected taxa for each sample
    ExtractPositiveReads {
        /// TSV samplesheet: sample, fastq, then one profile column per classifier
        #[arg(long)]
        samplesheet: PathBuf,
        #[arg(long, env = "TAXTOOLS_TAXONOMY")]
        taxonomy: PathBuf,
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        tool: Classifier,
        /// Rank up to which lower-level assignments are aggregated
        #[arg(long)]
        summarise_at: String,
        /// Expected positive taxids, one per line
        #[arg(long)]
        expected: PathBuf,
    },
    /// Print the ancestor of each input taxid at a given rank
    Taxid2ancestor {
        #[arg(long, env = "TAXTOOLS_TAXONOMY")]
        taxonomy: PathBuf,
        /// File with one taxid per line (stdin if omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        #[arg(long)]
        target_rank: String,
        /// Print the ancestor's scientific name
        #[arg(long)]
        name: bool,
        /// Print the ancestor's rank
        #[arg(long)]
        rank: bool,
    },
    /// Write a genome -> lineage table for sylph-tax
    BuildSylphTaxonomy {
        /// CSV samplesheet: name, taxid, fasta
        #[arg(long)]
        samplesheet: PathBuf,
        #[arg(long)]
        nodes_dmp: PathBuf,
        #[arg(long)]
        names_dmp: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Lineages of taxids instead of names
        #[arg(long)]
        use_taxids: bool,
    },
}

fn spinner(color: &str, message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let template = format!("{{spinner:.{color}}} {{msg}}");
    if let Ok(style) = ProgressStyle::default_spinner().template(&template) {
        spinner.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
    }
    spinner.set_message(message);
    spinner
}

fn write_output(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}

/// `out/table.tsv` + `species` -> `out/table.sum_to_species.tsv`
fn summarised_path(output: &Path, rank: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    output.with_file_name(format!("{stem}.sum_to_{rank}.tsv"))
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Summarise {
            samplesheet,
            taxonomy,
            output,
            tool,
            summarise_at,
        } => {
            let spinner = spinner("green", "Summarising profiles...");
            let results = run_summarise(&SummariseOptions {
                taxonomy_dir: taxonomy,
                samplesheet,
                classifier: tool,
                summarise_at: Some(summarise_at),
                ranks: canonical_ranks(),
            })?;
            spinner.finish_with_message("Profiles summarised.");

            write_output(&output, &results.get_table_tsv())?;
            if let (Some(text), Some(rank)) = (results.get_summarised_tsv(), &results.summarise_at) {
                write_output(&summarised_path(&output, rank), &text)?;
            }
        }
        Command::ExtractPositiveReads {
            samplesheet,
            taxonomy,
            output,
            tool,
            summarise_at,
            expected,
        } => {
            let spinner = spinner("green", "Extracting positive reads...");
            let results = run_extract(&ExtractOptions {
                taxonomy_dir: taxonomy,
                samplesheet,
                classifier: tool,
                expected_taxa: expected,
                summarise_at,
            })?;
            spinner.finish_with_message("Positive reads extracted.");
            write_output(&output, &results.get_extraction_tsv())?;
        }
        Command::Taxid2ancestor {
            taxonomy,
            input,
            target_rank,
            name,
            rank,
        } => {
            let taxa = TaxonomyGraph::from_dump_dir(&taxonomy)?;
            let report = match input {
                Some(path) => ancestors_report(&taxa, open_text(path)?, &target_rank, name, rank)?,
                None => ancestors_report(&taxa, BufReader::new(io::stdin()), &target_rank, name, rank)?,
            };
            print!("{report}");
        }
        Command::BuildSylphTaxonomy {
            samplesheet,
            nodes_dmp,
            names_dmp,
            output,
            use_taxids,
        } => {
            let spinner = spinner("yellow", "Resolving genome lineages...");
            let taxa = TaxonomyGraph::from_dump_files(&nodes_dmp, &names_dmp)?;
            let genomes = build_sylph_taxonomy(&taxa, open_text(&samplesheet)?, use_taxids)?;
            write_output(&output, &format_sylph_taxonomy(&genomes))?;
            spinner.finish_with_message("Sylph taxonomy written.");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
