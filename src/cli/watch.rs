//! Watch command implementation

use anyhow::{anyhow, Context, Result};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::output::{render_message, OutputMode};
use crate::store::MessageStore;
use crate::watch::{ChangeTracker, WatchRequest};

/// Stream new messages until Ctrl-C or a store failure
pub async fn run(store: Arc<MessageStore>, request: WatchRequest, mode: OutputMode) -> Result<()> {
    let tracker = ChangeTracker::new(Arc::clone(&store));
    let mut stream = tracker.stream(request)?;
    info!(path = %store.path().display(), "watching for new messages");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping watch");
                break;
            }
            next = stream.next() => {
                let Some(message) = next else {
                    break;
                };
                let message = message.context("change stream failed")?;
                for line in render_message(&store, &message, mode)? {
                    println!("{line}");
                }
            }
        }
    }

    stream.close().await;
    Ok(())
}

/// Parse a debounce interval: `250ms`, `2s`, `1m` or a bare millisecond count.
pub fn parse_duration(value: &str) -> Result<Duration> {
    let value = value.trim();
    let (number, unit) = match value.find(|c: char| !c.is_ascii_digit() && c != '.') {
        Some(split) => value.split_at(split),
        None => (value, "ms"),
    };
    let amount: f64 = number
        .parse()
        .map_err(|_| anyhow!("invalid duration: {value}"))?;
    let millis = match unit.trim() {
        "ms" => amount,
        "s" => amount * 1_000.0,
        "m" => amount * 60_000.0,
        other => return Err(anyhow!("unknown duration unit '{other}' in {value}")),
    };
    if !millis.is_finite() || millis < 0.0 {
        return Err(anyhow!("invalid duration: {value}"));
    }
    Ok(Duration::from_millis(millis.round() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("0.5s").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("1m").unwrap(), Duration::from_secs(60));
        assert_eq!(parse_duration("100").unwrap(), Duration::from_millis(100));
        assert_eq!(parse_duration(" 10 ms ").unwrap(), Duration::from_millis(10));
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("fast").is_err());
        assert!(parse_duration("10h").is_err());
        assert!(parse_duration("1.2.3s").is_err());
    }
}
