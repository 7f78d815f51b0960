//! Minimal feed subscriber.
//!
//! Connects to a running `newest_feed` server and prints the title of every
//! article in each `newArticles` message.
//!
//! ```sh
//! subscriber --url ws://localhost:8080/
//! ```

use clap::Parser;
use futures::StreamExt;
use std::error::Error;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

use newest_feed::models::FeedMessage;

#[derive(Parser, Debug)]
#[command(about = "Print titles pushed by a newest_feed server")]
struct Args {
    /// Websocket URL of the feed server
    #[arg(short, long, default_value = "ws://localhost:8080/")]
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let (socket, _) = connect_async(args.url.as_str()).await?;
    info!(url = %args.url, "Connected to WebSocket server");

    let (_sink, mut stream) = socket.split();
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => match serde_json::from_str::<FeedMessage>(&text) {
                Ok(message) => {
                    println!("\nNew articles received:");
                    for title in message.titles() {
                        println!("- {title}");
                    }
                }
                Err(e) => warn!(error = %e, "Ignoring unrecognized message"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "WebSocket error");
                break;
            }
        }
    }

    info!("Disconnected from server");
    Ok(())
}
