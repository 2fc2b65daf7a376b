use queue_courier_cli::run_cli;

#[tokio::main]
async fn main() {
    if let Err(e) = run_cli().await {
        // Logging may not be set up yet when configuration fails
        eprintln!("error: {}", e);

        std::process::exit(e.exit_code());
    }
}
