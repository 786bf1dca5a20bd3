mod exports;
mod styling;
mod summary;
mod tables;

pub use exports::to_json;
pub use summary::{render_pipelines, render_runs, render_snapshot};

use styling::{dim, magenta_bold};

/// Prints the stagescope banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔭 stagescope"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("Pipeline stage status for Azure DevOps")
    );
}
