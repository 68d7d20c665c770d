use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use fixture_secrets::cli::Cli;
use fixture_secrets::config;
use fixture_secrets::pipeline;
use fixture_secrets::resolver::SecretResolver;
use fixture_secrets::store::SecretsManagerClient;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // Anything but exactly three arguments, `--help` included, is fatal.
    let args = match Cli::parse_args(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let cfg = config::load(&args.region).await;
    let client = SecretsManagerClient::new(&cfg)?;
    tracing::info!(
        "Injecting secrets from {} into {} (region {})",
        args.key_secrets_file.display(),
        args.target_file.display(),
        client.region()
    );

    let resolver = SecretResolver::new(client);
    pipeline::run(&args.key_secrets_file, &args.target_file, &resolver).await;

    // Individual failures were already reported; the run itself succeeds.
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "fixture_secrets=info".into()),
    );
    let json = std::env::var("FIXTURE_SECRETS_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let fmt_layer = if json {
        tracing_subscriber::fmt::layer().json().boxed()
    } else {
        tracing_subscriber::fmt::layer().boxed()
    };

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
