use clap::Parser;
use futures::FutureExt;
use uptimed::Args;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(args.log_level.clone()))
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let shutdown = tokio::signal::ctrl_c().map(|_| ()).shared();

    let result = runtime.block_on(uptimed::run(args, shutdown));
    tracing::info!(?result, "uptimed exiting");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result
}
