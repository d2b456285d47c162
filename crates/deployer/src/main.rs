use clap::Parser;

#[tokio::main]
async fn main() {
    let args = deployer::arguments::Arguments::parse();
    observe::tracing::initialize(
        "warn,deployer=debug,contracts=debug",
        tracing::Level::ERROR.into(),
    );
    tracing::info!("running deployer with validated arguments:\n{}", args);
    deployer::main(args).await;
}
