//! `dashwire run`: stream one scenario and print its log.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use tracing::info;

use super::output::{format_log_line, format_result, print_lines};
use crate::config::DashwireConfig;
use crate::sse::{SessionStatus, SseReader, StreamRequest};

/// Run the scenario in `request`, printing log lines as they arrive.
///
/// Returns an error when the session ends in `error` or the scenario
/// completes without success.
pub async fn handle_run_command(config: &DashwireConfig, request: StreamRequest) -> Result<()> {
    let mut reader = SseReader::new(config);
    let mut updates = reader.subscribe();
    info!("Streaming scenario from {}", reader.url());

    reader.start_stream(request, None);

    let mut printed = 0;
    loop {
        {
            let session = updates.borrow_and_update();
            for line in session.log_lines.iter().skip(printed) {
                println!("{}", format_log_line(line));
            }
            printed = session.log_lines.len();

            match session.status {
                SessionStatus::Completed => {
                    return match &session.result {
                        Some(result) => {
                            print_lines(&format_result(result));
                            if result.success {
                                Ok(())
                            } else {
                                Err(eyre!("Scenario '{}' did not pass", result.scenario))
                            }
                        }
                        None => Err(eyre!("Scenario completed without a result")),
                    };
                }
                SessionStatus::Error => {
                    let message = session
                        .error_message
                        .clone()
                        .unwrap_or_else(|| "Unknown error".to_string());
                    return Err(eyre!(message));
                }
                SessionStatus::Idle | SessionStatus::Streaming => {}
            }
        }

        if updates.changed().await.is_err() {
            return Err(eyre!("Stream reader stopped unexpectedly"));
        }
    }
}
