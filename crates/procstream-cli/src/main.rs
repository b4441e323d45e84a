// procstream CLI entry point

use clap::Parser;
use procstream_cli::{init_logging, run, Cli};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("procstream: {:#}", e);
            1
        }
    };

    // Exit directly: a blocking read on our stdin may still be parked.
    std::process::exit(code);
}
