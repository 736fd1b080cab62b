use std::error::Error;

use secrecy::SecretString;
use twitter_stream_sdk::model::{Status, StatusDeletionNotice};
use twitter_stream_sdk::stream::{StreamClient, StreamError, StreamListener};

struct Printer;

impl StreamListener for Printer {
    fn on_status(&self, status: &Status) {
        let author = status
            .user
            .as_ref()
            .map(|user| user.screen_name.as_str())
            .unwrap_or("?");
        println!("@{author}: {}", status.text);
    }

    fn on_deletion_notice(&self, notice: &StatusDeletionNotice) {
        println!("deleted status_id={}", notice.status_id);
    }

    fn on_track_limitation_notice(&self, limited: u64) {
        println!("limited={limited}");
    }

    fn on_exception(&self, error: &StreamError) {
        eprintln!("skipped line: {error}");
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let token = "REPLACE_WITH_BEARER_TOKEN".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = StreamClient::new(SecretString::new(token))?;
        let mut stream = client.sample().await?;

        // No reconnect here; supervised_filter_stream shows the driver.
        let error = loop {
            if let Err(error) = stream.next_with(&Printer).await {
                break error;
            }
        };
        eprintln!("sample stream closed: {error}");

        Ok::<(), Box<dyn Error>>(())
    })
}
