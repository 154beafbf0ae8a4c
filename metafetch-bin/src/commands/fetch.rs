use std::time::{Duration, Instant};

use log::{info, warn};
use metafetch_lib::{BatchResult, CancellationToken, Result, run_batch_with};

use super::CommandParams;
use crate::{ExitCode, progress::Progress, stats::FetchStats};

/// Fetch the metadata of every request and report progress on the way
pub(crate) async fn fetch(params: CommandParams) -> Result<(BatchResult, FetchStats, ExitCode)> {
    let CommandParams {
        client,
        requests,
        cancel,
        cfg,
    } = params;

    let progress = Progress::new(requests.len(), cfg.no_progress);
    let start = Instant::now();

    let result = run_batch_with(client, requests, &cfg.rate_limit(), &cancel, |completion| {
        progress.update(completion);
    })
    .await?;

    // Note that print statements may interfere with the progress bar, so this
    // must go before printing the stats
    let cancelled = cancel.is_cancelled();
    progress.finish(cancelled);

    let stats = FetchStats::new(&result, start.elapsed(), cancelled);
    let code = if result.is_success() {
        ExitCode::Success
    } else {
        ExitCode::RequestFailure
    };
    Ok((result, stats, code))
}

/// Cancel `token` on Ctrl-C or once `max_runtime` has passed
pub(crate) fn cancel_on_interrupt(token: &CancellationToken, max_runtime: Option<Duration>) {
    let token = token.clone();
    tokio::spawn(async move {
        let deadline = async {
            match max_runtime {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            () = token.cancelled() => return,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => warn!("Interrupted, writing the results fetched so far"),
                Err(e) => {
                    warn!("Cannot listen for Ctrl-C: {e}");
                    return;
                }
            },
            () = deadline => {
                info!("Maximum runtime reached, writing the results fetched so far");
            }
        }
        token.cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;
    use metafetch_lib::{ClientBuilder, Key, Request};
    use pretty_assertions::assert_eq;
    use test_utils::{api_error_body, mock_drive};

    use crate::options::MetafetchOptions;

    fn params(base_url: &str, keys: &[&str]) -> CommandParams {
        let cfg = MetafetchOptions::parse_from(["metafetch", "-", "out.json", "--no-progress"]).config;
        CommandParams {
            client: ClientBuilder::builder()
                .base_url(base_url)
                .build()
                .client()
                .unwrap(),
            requests: keys
                .iter()
                .map(|key| Request::from(Key::new(key).unwrap()))
                .collect(),
            cancel: CancellationToken::new(),
            cfg,
        }
    }

    #[tokio::test]
    async fn test_fetch_with_failure() {
        let server = mock_drive! {
            "a" => wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "a"})),
            "b" => wiremock::ResponseTemplate::new(404).set_body_json(api_error_body!(404, "File not found: b.")),
        };

        let (result, _, code) = fetch(params(&server.uri(), &["a", "b"])).await.unwrap();
        assert_eq!(code, ExitCode::RequestFailure);
        assert_eq!(result.metadata(), &[serde_json::json!({"id": "a"})]);
        assert_eq!(result.errors()[0].code, Some(404));
    }

    #[tokio::test]
    async fn test_fetch_all_successful() {
        let server = mock_drive! {
            "a" => wiremock::ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "a"})),
        };

        let (result, _, code) = fetch(params(&server.uri(), &["a"])).await.unwrap();
        assert_eq!(code, ExitCode::Success);
        assert_eq!(result.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_runtime_cancels() {
        let token = CancellationToken::new();
        cancel_on_interrupt(&token, Some(Duration::from_secs(5)));
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert!(token.is_cancelled());
    }
}
