use clap::Parser;

#[tokio::main]
async fn main() {
    let cli = tether::cli::Cli::parse();
    if let Err(e) = tether::cmd::dispatch(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
