use std::error::Error;

use secrecy::SecretString;
use twitter_stream_sdk::model::{DirectMessage, Status, User, UserList};
use twitter_stream_sdk::stream::{StreamClient, StreamListener};

struct Activity;

impl StreamListener for Activity {
    fn on_friend_list(&self, friend_ids: &[i64]) {
        println!("following {} accounts", friend_ids.len());
    }

    fn on_status(&self, status: &Status) {
        println!("status id={} retweet={}", status.id, status.is_retweet());
    }

    fn on_direct_message(&self, message: &DirectMessage) {
        println!(
            "dm from @{} to @{}: {}",
            message.sender_screen_name, message.recipient_screen_name, message.text
        );
    }

    fn on_favorite(&self, source: &User, target: &User, status: &Status) {
        println!("@{} liked @{}'s status {}", source.screen_name, target.screen_name, status.id);
    }

    fn on_follow(&self, source: &User, followed: &User) {
        println!("@{} followed @{}", source.screen_name, followed.screen_name);
    }

    fn on_user_list_member_addition(&self, added_member: &User, owner: &User, list: &UserList) {
        println!(
            "@{} added @{} to {} (public={})",
            owner.screen_name,
            added_member.screen_name,
            list.full_name,
            list.is_public()
        );
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let token = "REPLACE_WITH_BEARER_TOKEN".to_string();

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let client = StreamClient::new(SecretString::new(token))?;
        let mut stream = client.user().await?;

        while stream.is_open() {
            if let Err(error) = stream.next_with(&Activity).await {
                eprintln!("user stream ended: {error}");
            }
        }

        Ok::<(), Box<dyn Error>>(())
    })
}
