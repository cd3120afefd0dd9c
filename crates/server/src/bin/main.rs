use chaingate_server::ChainGateServer;

#[derive(clap::Parser)]
#[command(name = "chaingate", about = "Blockchain data query gateway")]
struct Args {
    /// YAML configuration file; CHAINGATE_* variables override it
    #[arg(long, default_value = "config/chaingate.yaml")]
    config: String,

    /// Listen address, overrides server.listen_addr
    #[arg(long)]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = <Args as clap::Parser>::parse();

    ChainGateServer::new()
        .with_config(&args.config)
        .with_listen_addr(args.listen)
        .run()
        .await
}
