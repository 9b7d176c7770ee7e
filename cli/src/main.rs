use clap::Parser;

use captioner_cli::args::Cli;

fn main() {
    // Pick up OPENAI_API_KEY from a local .env if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    captioner_cli::init_logging(&["captioner=info", "captioner_cli=info", "captioner_core=info"]);

    if let Err(e) = captioner_cli::run(cli) {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}
