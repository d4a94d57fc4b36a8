//! Command-line client for manual testing of a running predserve server.
//!
//! ```text
//! predict-client health
//! predict-client predict 1 0 29 0 0 211.34
//! predict-client demo
//! ```

use clap::{Parser, Subcommand};
use predserve_server::pb::prediction_service_client::PredictionServiceClient;
use predserve_server::pb::{HealthRequest, HealthResponse, PredictRequest, PredictResponse};
use tonic::transport::Channel;
use tonic::Status;

#[derive(Parser)]
#[command(name = "predict-client", about = "Call a predserve gRPC server")]
struct Cli {
    /// Server host.
    #[arg(long, env = "GRPC_HOST", default_value = "localhost", global = true)]
    host: String,

    /// Server port.
    #[arg(long, env = "GRPC_PORT", default_value_t = 50051, global = true)]
    port: u16,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check server health.
    Health,
    /// Request a prediction: Pclass Sex Age SibSp Parch Fare.
    Predict {
        #[arg(allow_negative_numbers = true)]
        features: Vec<f32>,
    },
    /// Run the canonical passengers plus an invalid request.
    Demo,
}

/// Canonical passengers: `[Pclass, Sex, Age, SibSp, Parch, Fare]`.
const DEMO_CASES: [([f32; 6], &str); 5] = [
    ([1.0, 0.0, 29.0, 0.0, 0.0, 211.34], "Rose (1st class woman)"),
    ([3.0, 1.0, 25.0, 0.0, 0.0, 7.25], "Jack (3rd class man)"),
    ([1.0, 1.0, 4.0, 1.0, 2.0, 120.00], "Child (1st class)"),
    ([3.0, 0.0, 55.0, 0.0, 0.0, 7.79], "Elderly woman (3rd class)"),
    ([2.0, 1.0, 35.0, 1.0, 0.0, 26.00], "Man (2nd class)"),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let endpoint = format!("http://{}:{}", cli.host, cli.port);
    let mut client = PredictionServiceClient::connect(endpoint.clone())
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to {endpoint}: {e}"))?;

    match cli.command {
        Command::Health => match health(&mut client).await {
            Ok(resp) => print_health(&resp),
            Err(status) => print_status("Error", &status),
        },
        Command::Predict { features } => match predict(&mut client, features.clone()).await {
            Ok(resp) => print_prediction(&features, "", &resp),
            Err(status) => print_status("Error", &status),
        },
        Command::Demo => demo(&mut client).await,
    }
    Ok(())
}

async fn demo(client: &mut PredictionServiceClient<Channel>) {
    println!("{}", "=".repeat(60));
    println!("Testing Titanic Survival Prediction Service");
    println!("Features: [Pclass, Sex, Age, SibSp, Parch, Fare]");
    println!("Sex: 0=female, 1=male | Pclass: 1=1st, 2=2nd, 3=3rd");
    println!("{}", "=".repeat(60));

    println!("\n1. Health check:");
    match health(client).await {
        Ok(resp) => print_health(&resp),
        Err(status) => {
            print_status("Error", &status);
            return;
        }
    }

    println!("\n2. Prediction tests:");
    for (features, description) in DEMO_CASES {
        println!();
        match predict(client, features.to_vec()).await {
            Ok(resp) => print_prediction(&features, description, &resp),
            Err(status) => print_status("  Error", &status),
        }
    }

    println!("\n3. Invalid input test:");
    match predict(client, vec![1.0, 2.0, 3.0]).await {
        Ok(resp) => println!("  Unexpected success: {resp:?}"),
        Err(status) => {
            println!("  Expected error: {:?}", status.code());
            println!("  Details: {}", status.message());
        }
    }
}

async fn health(client: &mut PredictionServiceClient<Channel>) -> Result<HealthResponse, Status> {
    Ok(client.health(HealthRequest {}).await?.into_inner())
}

async fn predict(
    client: &mut PredictionServiceClient<Channel>,
    features: Vec<f32>,
) -> Result<PredictResponse, Status> {
    Ok(client
        .predict(PredictRequest { features })
        .await?
        .into_inner())
}

fn print_health(resp: &HealthResponse) {
    println!("Health check:");
    println!("  Status: {}", resp.status);
    println!("  Model version: {}", resp.model_version);
}

fn print_prediction(features: &[f32], description: &str, resp: &PredictResponse) {
    let outcome = if resp.prediction == 1 { "Survived" } else { "Died" };
    if description.is_empty() {
        println!("Prediction:");
    } else {
        println!("Prediction ({description}):");
    }
    println!("  Features: {features:?}");
    println!("  Result: {} ({outcome})", resp.prediction);
    println!("  Confidence: {:.2}%", resp.confidence * 100.0);
    println!("  Model version: {}", resp.model_version);
}

fn print_status(prefix: &str, status: &Status) {
    println!("{prefix}: {:?} - {}", status.code(), status.message());
}
