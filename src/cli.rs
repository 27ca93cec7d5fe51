use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use std::io::Read;
use std::path::{Path, PathBuf};

use ci_scope::ci::{merge_documents, resolve_extends};
use ci_scope::codec::YamlCodec;
use ci_scope::triggers::{load_pipelines, PipelineSelector};

use crate::config::{Config, OutputFormat};
use crate::output;

#[derive(Parser)]
#[command(name = "ci-scope")]
#[command(author, version, about = "Change-based pipeline selection and CI extends resolution", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./ci-scope.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List the pipelines triggered by a set of changed files
    Triggered {
        /// Pipelines directory or legacy pipelines file
        #[arg(short = 'P', long, env = "CI_SCOPE_PIPELINES")]
        pipelines: Option<PathBuf>,

        /// Changed file path (repeatable)
        #[arg(long = "changed")]
        changed: Vec<String>,

        /// Read changed file paths, one per line, from a file or `-` for stdin
        #[arg(long)]
        changed_from: Option<PathBuf>,

        #[arg(short, long, value_enum)]
        format: Option<OutputFormat>,

        #[arg(short, long, default_value_t = false)]
        pretty: bool,

        /// Match patterns without regard to ASCII case
        #[arg(long, default_value_t = false)]
        case_insensitive: bool,
    },

    /// Merge CI files and resolve `extends:` into alias-free YAML
    Resolve {
        /// CI files, deep-merged in the order given
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a configuration file with default settings
    Init {
        #[arg(default_value = "ci-scope.toml")]
        path: PathBuf,
    },
}

impl Cli {
    fn execute_triggered(
        config: &Config,
        pipelines_path: Option<&Path>,
        changed: &[String],
        changed_from: Option<&Path>,
        format: Option<OutputFormat>,
        pretty: bool,
        case_insensitive: bool,
    ) -> Result<()> {
        let pipelines_path = pipelines_path.unwrap_or(config.pipelines.path.as_path());
        let pipelines = load_pipelines(pipelines_path).with_context(|| {
            format!("Failed to load pipelines from: {}", pipelines_path.display())
        })?;

        let mut changed_files = changed.to_vec();
        if let Some(source) = changed_from {
            changed_files.extend(read_changed_files(source)?);
        }

        let mut matcher = config.patterns.matcher();
        matcher.case_insensitive |= case_insensitive;

        let selector = PipelineSelector::new(matcher);
        let triggered = selector.get_triggered(&pipelines, &changed_files[..]);
        info!(
            "Selected {} of {} pipelines",
            triggered.len(),
            pipelines.len()
        );

        let format = format.unwrap_or(config.output.format);
        let pretty = pretty || config.output.pretty;
        match format {
            OutputFormat::Table => output::print_pipelines(&triggered, changed_files.len()),
            OutputFormat::Json => {
                let json_output = if pretty {
                    serde_json::to_string_pretty(&triggered)?
                } else {
                    serde_json::to_string(&triggered)?
                };
                println!("{json_output}");
            }
            OutputFormat::Names => {
                for pipeline in &triggered {
                    println!("{}", pipeline.name);
                }
            }
        }

        Ok(())
    }

    fn execute_resolve(files: &[PathBuf], output: Option<&Path>) -> Result<()> {
        let codec = YamlCodec::gitlab();

        let documents = files
            .iter()
            .map(|path| {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read CI file: {}", path.display()))?;
                codec
                    .load_document(&contents)
                    .with_context(|| format!("Failed to parse CI file: {}", path.display()))
            })
            .collect::<Result<Vec<_>>>()?;

        let merged = merge_documents(&documents);
        let resolved = resolve_extends(&merged).context("Failed to resolve extends")?;
        let text = codec
            .dump_document(&resolved)
            .context("Failed to serialize resolved CI document")?;

        if let Some(output_path) = output {
            std::fs::write(output_path, text)
                .with_context(|| format!("Failed to write: {}", output_path.display()))?;
            info!("Resolved CI written to: {}", output_path.display());
        } else {
            print!("{text}");
        }

        Ok(())
    }

    pub fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Triggered {
                pipelines,
                changed,
                changed_from,
                format,
                pretty,
                case_insensitive,
            } => Self::execute_triggered(
                &config,
                pipelines.as_deref(),
                changed,
                changed_from.as_deref(),
                *format,
                *pretty,
                *case_insensitive,
            ),
            Commands::Resolve { files, output } => Self::execute_resolve(files, output.as_deref()),
            Commands::Init { path } => {
                if path.exists() {
                    anyhow::bail!("Refusing to overwrite existing file: {}", path.display());
                }
                config.save(path)?;
                info!("Configuration written to: {}", path.display());
                Ok(())
            }
        }
    }
}

fn read_changed_files(source: &Path) -> Result<Vec<String>> {
    let contents = if source == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read changed files from stdin")?;
        buffer
    } else {
        std::fs::read_to_string(source)
            .with_context(|| format!("Failed to read changed files: {}", source.display()))?
    };

    Ok(parse_changed_files(&contents))
}

fn parse_changed_files(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_changed_files_skips_blank_lines() {
        let files = parse_changed_files("src/main.rs\n\n  docs/a.md  \n");
        assert_eq!(files, vec!["src/main.rs", "docs/a.md"]);
    }

    #[test]
    fn test_cli_parses_triggered() {
        let cli = Cli::try_parse_from([
            "ci-scope",
            "triggered",
            "-P",
            "ci/pipelines",
            "--changed",
            "a.rs",
            "--changed",
            "b.rs",
            "--format",
            "names",
        ])
        .unwrap();

        match cli.command {
            Commands::Triggered {
                pipelines,
                changed,
                format,
                ..
            } => {
                assert_eq!(pipelines, Some(PathBuf::from("ci/pipelines")));
                assert_eq!(changed, vec!["a.rs", "b.rs"]);
                assert_eq!(format, Some(OutputFormat::Names));
            }
            _ => panic!("expected triggered"),
        }
    }

    #[test]
    fn test_resolve_writes_output_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let base = temp_dir.path().join("base.yml");
        let jobs = temp_dir.path().join("jobs.yml");
        let out = temp_dir.path().join("resolved.yml");
        std::fs::write(&base, ".base:\n  image: alpine\nstages:\n- build\n").unwrap();
        std::fs::write(&jobs, "stages:\n- test\njob:\n  extends: .base\n  script:\n  - make\n")
            .unwrap();

        Cli::execute_resolve(&[base, jobs], Some(&out)).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            ".base:\n  image: alpine\nstages:\n- build\n- test\njob:\n  image: alpine\n  script:\n  - make\n"
        );
    }
}
