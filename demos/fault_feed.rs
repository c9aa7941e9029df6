// demos/fault_feed.rs
use evcharge_push::config::ChannelConfig;
use evcharge_push::types::{ClientRequest, PushMessage};
use evcharge_push::websocket::{ChannelState, PushChannel};
use std::env;
use tokio::time::{sleep, Duration};

const DEFAULT_FEED_URL: &str = "ws://localhost:8080/ws/pile-status";

fn print_message(msg: &PushMessage) -> anyhow::Result<()> {
    match msg {
        PushMessage::FaultAlert {
            pile_no,
            severity,
            fault_description,
            ..
        } => println!("FAULT  pile={} severity={} {}", pile_no, severity, fault_description),
        PushMessage::PileStatus { pile_id, status } => {
            println!("STATUS pile={} status={:?}", pile_id, status)
        }
        other => println!("Received Message: {:?}", other),
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging (optional)
    env_logger::init();

    // Optional: Load .env file if you have one
    dotenv::dotenv().ok();

    // The environment wins when it names a feed; a bad value there is reported, not papered over.
    let config = if env::var("EV_PUSH_URL").is_ok() {
        match ChannelConfig::from_env() {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid feed configuration: {}", e);
                return;
            }
        }
    } else {
        ChannelConfig::new(env::args().nth(1).unwrap_or_else(|| DEFAULT_FEED_URL.to_string()))
    };
    println!("Connecting to push feed at {}...", config.url);

    let channel = match PushChannel::with_tungstenite(config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Invalid feed configuration: {}", e);
            return;
        }
    };
    channel.subscribe(print_message);

    // Report connectivity changes as they happen
    let mut states = channel.state_receiver();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("Channel state: {:?}", state);
        }
    });

    channel.connect();

    // Ping every 10 seconds for a minute; pings while disconnected are dropped.
    for _ in 0..6 {
        sleep(Duration::from_secs(10)).await;
        if channel.state() == ChannelState::Open {
            if let Err(e) = channel.send(&ClientRequest::Ping) {
                eprintln!("Failed to encode ping: {}", e);
            }
        }
    }

    println!("Closing channel...");
    channel.close().await;
    println!("Demo finished.");
}
