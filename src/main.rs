//! Metrolog CLI entry point.

use metrolog_lib::cli::{self, Cli};
use metrolog_lib::core::Result;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse_args();

    // Execute the command
    cli::execute(cli).await
}
