use scrivener::cli::{self, output::Output, Cli};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // .env is optional; real environments set variables directly
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("scrivener=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse_args();
    let out = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    if let Err(e) = cli::execute(cli).await {
        out.error(&e.to_string());
        std::process::exit(1);
    }
}
