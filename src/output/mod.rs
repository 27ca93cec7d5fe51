mod styling;
mod tables;

use ci_scope::triggers::Pipeline;

use styling::{bright_green, bright_yellow, cyan, dim, magenta_bold};

/// Prints the ci-scope banner to stderr.
///
/// Displays the tool name, version, and description at the start of execution.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 ci-scope"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Change-based pipeline selection")
    );
}

/// Prints the triggered pipelines as a table to stdout.
pub fn print_pipelines(pipelines: &[&Pipeline], changed_files: usize) {
    let source = if changed_files == 0 {
        bright_yellow("no changed files given, running everything".to_string())
    } else {
        cyan(format!("{changed_files} changed files"))
    };

    println!(
        "{} {}",
        bright_green(format!("{} pipelines triggered", pipelines.len())),
        dim(format!("({source})"))
    );
    println!("{}", tables::pipelines_table(pipelines));
}
