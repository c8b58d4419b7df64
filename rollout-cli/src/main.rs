use rollout_cli::cmd::{self, Outcome};
use tracing::info;

#[tokio::main]
async fn main() {
    let subscriber = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::INFO.into())
                .from_env_lossy(),
        )
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {e}");
    }

    match cmd::Cli::run().await {
        Ok(outcome) => {
            match &outcome {
                Outcome::Table(table) => print!("{table}"),
                Outcome::Done(message) => info!("{message}"),
                Outcome::NotFound(message) => println!("{message}"),
            }
            std::process::exit(outcome.exit_code());
        }
        Err(e) => {
            eprintln!("Oops! {e}");

            let mut source = e.source();
            if source.is_some() {
                eprintln!("\nCaused by:");
                let mut index = 0;
                while let Some(err) = source {
                    eprintln!("    {index}: {err}");
                    source = err.source();
                    index += 1;
                }
            }
            std::process::exit(1);
        }
    }
}
