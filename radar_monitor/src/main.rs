use radar_monitor::{config::MonitorConfig, radar_monitor};


#[tokio::main]
async fn main() {
    // construct a subscriber that prints formatted traces to stdout
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    // use that subscriber to process traces emitted after this point
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set global tracing subscriber.");

    let config = MonitorConfig::from_env().expect("Invalid RADAR_* configuration");

    radar_monitor(config)
        .await
        .expect("Radar monitor failed");
}
