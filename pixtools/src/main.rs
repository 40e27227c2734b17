use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};

mod client;
mod poller;
mod webhook_signature;

use crate::{
    client::PaymentServerClient,
    poller::{PaymentPoller, PollOutcome, PollTick},
    webhook_signature::{print_webhook_signature, SignWebhookParams},
};

#[derive(Parser, Debug)]
#[command(version, about = "Tools for working with the PIX payment server")]
pub struct Arguments {
    /// The payment server's base URL
    #[arg(short, long, env = "PIX_SERVER_URL", default_value = "http://localhost:3000")]
    server: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the server is up
    Health,
    /// Create a PIX charge for an order
    Create(CreateParams),
    /// Fetch the status of a payment
    Status(StatusParams),
    /// Poll a payment until it settles
    Watch(WatchParams),
    /// Compute (or check) a webhook signature
    #[clap(name = "sign-webhook")]
    SignWebhook(SignWebhookParams),
    /// Send an order straight to the printer
    Print {
        /// The order, as JSON
        order: String,
    },
}

#[derive(Debug, Args)]
pub struct CreateParams {
    /// The amount in reais, e.g. 35.50
    #[arg(short, long)]
    amount: f64,
    /// The order id
    #[arg(short, long = "order")]
    order_id: String,
    /// The order payload that is sent to the printer once the payment is approved, as JSON
    #[arg(short = 'd', long = "data")]
    order_data: Option<String>,
    /// Send this key again when retrying, so that the processor does not charge twice
    #[arg(short, long)]
    idempotency_key: Option<String>,
    /// Create a simulated payment using the dev endpoint
    #[arg(long)]
    dev: bool,
    /// Keep polling the new payment until it settles
    #[arg(short, long)]
    watch: bool,
}

#[derive(Debug, Args)]
pub struct StatusParams {
    id: String,
    /// Ask the processor, even if the server already knows the final status
    #[arg(short, long)]
    force: bool,
    /// Show the stored payment record instead
    #[arg(short, long)]
    record: bool,
}

#[derive(Debug, Args)]
pub struct WatchParams {
    id: String,
    /// Seconds between status checks
    #[arg(short, long, default_value = "3")]
    interval: u64,
    /// Seconds to wait before giving up
    #[arg(short, long, default_value = "600")]
    deadline: u64,
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    env_logger::init();
    let cli = Arguments::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Arguments) -> Result<()> {
    let client = || PaymentServerClient::new(&cli.server);
    match cli.command {
        Command::Health => {
            let client = client()?;
            println!("{}: {}", client.server(), client.health().await?.trim())
        },
        Command::Create(params) => create_payment(client()?, params).await?,
        Command::Status(params) => print_status(&client()?, params).await?,
        Command::Watch(params) => {
            let interval = Duration::from_secs(params.interval.max(1));
            watch_payment(client()?, &params.id, interval, Duration::from_secs(params.deadline)).await?
        },
        Command::Print { order } => {
            let order = parse_json(&order)?;
            let result = client()?.print_order(&order).await?;
            println!("Printer responded with {}", result.proxied);
        },
        Command::SignWebhook(params) => print_webhook_signature(params)?,
    }
    Ok(())
}

async fn create_payment(client: PaymentServerClient, params: CreateParams) -> Result<()> {
    let order_data = params.order_data.as_deref().map(parse_json).transpose()?;
    let body = json!({"amount": params.amount, "orderId": params.order_id, "orderData": order_data});
    let charge = client.create_payment(&body, params.idempotency_key.as_deref(), params.dev).await?;
    println!("----------------------------- PIX Charge -----------------------------");
    println!("Payment id  : {}", charge.payment_id);
    println!("Status      : {}", charge.status);
    println!("Simulated   : {}", charge.simulated);
    println!("QR image    : {} ({} base64 characters)", charge.qr_image_format, charge.qr_image.len());
    println!("Copia e cola: {}", charge.copy_paste_code);
    println!("-----------------------------------------------------------------------");
    if params.watch {
        watch_payment(client, &charge.payment_id, poller::DEFAULT_POLL_INTERVAL, poller::DEFAULT_POLL_DEADLINE)
            .await?;
    }
    Ok(())
}

async fn print_status(client: &PaymentServerClient, params: StatusParams) -> Result<()> {
    let response = if params.record {
        client.payment_record(&params.id).await?
    } else if params.force {
        serde_json::to_value(client.payment_status(&params.id).await?)?
    } else {
        client.check_payment(&params.id).await?
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

async fn watch_payment(client: PaymentServerClient, id: &str, interval: Duration, deadline: Duration) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} [{elapsed}] {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Waiting for payment {id}"));
    let poller = PaymentPoller::new(client).with_interval(interval).with_deadline(deadline);
    let outcome = poller
        .poll(
            id,
            |tick| match tick {
                PollTick::Status(status) => spinner.set_message(format!("Payment {id} is {status}")),
                PollTick::Error(e) => spinner.set_message(format!("Status check failed, retrying. {e}")),
                PollTick::Timeout => spinner.set_message("Status check timed out, retrying".to_string()),
            },
            || spinner.println(format!("✅️ Payment {id} approved")),
        )
        .await;
    spinner.finish_and_clear();
    match outcome {
        PollOutcome::Approved | PollOutcome::AlreadyCompleted => Ok(()),
        PollOutcome::Failed(status) => Err(anyhow!("Payment {id} was {status}")),
        PollOutcome::TimedOut => Err(anyhow!("Payment {id} did not settle within {}s", deadline.as_secs())),
    }
}

fn parse_json(s: &str) -> Result<Value> {
    serde_json::from_str(s).map_err(|e| anyhow!("Invalid JSON. {e}"))
}
