use std::error::Error;
use std::sync::Arc;

use secrecy::SecretString;
use tracing_subscriber::EnvFilter;
use twitter_stream_sdk::model::{DisconnectNotice, StallWarning, Status};
use twitter_stream_sdk::stream::{
    FilterQuery, StreamClient, StreamDriver, StreamDriverOptions, StreamError, StreamListener,
};

struct Printer;

impl StreamListener for Printer {
    fn on_status(&self, status: &Status) {
        println!("{}: {}", status.id, status.text);
    }

    fn on_stall_warning(&self, warning: &StallWarning) {
        println!("falling behind: {}% full", warning.percent_full);
    }

    fn on_disconnect(&self, notice: &DisconnectNotice) {
        println!("server disconnect code={} reason={}", notice.code, notice.reason);
    }

    fn on_exception(&self, error: &StreamError) {
        eprintln!("{error}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let token = "REPLACE_WITH_BEARER_TOKEN".to_string();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = StreamClient::new(SecretString::new(token))?;
        let query = FilterQuery::track(["rust", "tokio"]);

        let listener: Arc<dyn StreamListener> = Arc::new(Printer);
        let driver = StreamDriver::spawn(
            move || {
                let client = client.clone();
                let query = query.clone();
                async move { client.filter(&query).await }
            },
            vec![listener],
            StreamDriverOptions::default(),
        );

        tokio::signal::ctrl_c().await?;
        let exit = driver.shutdown().await?;
        println!("driver stopped: {exit:?}");

        Ok::<(), Box<dyn Error>>(())
    })
}
