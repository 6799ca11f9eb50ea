use anyhow::Result;
use treeaudit::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.run()
}
