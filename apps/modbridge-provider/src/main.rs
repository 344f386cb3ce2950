mod service;

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use modbridge_grpc_stubs::ResourceProviderServer;
use tonic::transport::Server;

use service::ProviderService;

/// gRPC resource provider bridging an external module runtime into a host
/// orchestration engine.
#[derive(Parser)]
#[command(name = "modbridge-provider")]
#[command(about = "Resource provider bridging a Terraform-style module into a host engine")]
#[command(version = "0.1.0")]
struct Cli {
    /// Port to serve the provider's gRPC service on.
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG always wins.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(cli.verbose);

    let addr: SocketAddr = format!("127.0.0.1:{}", cli.port).parse()?;
    let service = ProviderService::new();

    let server = Server::builder().add_service(ResourceProviderServer::new(service));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    // The host engine that launches this process as a plugin reads the
    // listening port from a single stdout line.
    println!("{bound_addr}");

    tracing::info!(address = %bound_addr, "modbridge-provider listening");

    server
        .serve_with_incoming(tokio_stream::wrappers::TcpListenerStream::new(listener))
        .await?;

    Ok(())
}

fn init_telemetry(verbose: u8) {
    let override_filter = match verbose {
        0 => None,
        1 => Some("info,modbridge=info"),
        2 => Some("info,modbridge=debug"),
        _ => Some("info,modbridge=trace"),
    };
    modbridge::telemetry::init(override_filter);
}
