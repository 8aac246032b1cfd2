//! End-of-run email report.
//!
//! A real (non-debug) run mails its buffered log lines as one document by
//! piping an RFC 5322 message into the local sendmail binary. Debug runs
//! never get here; the driver's log already went to the console.

use std::process::Stdio;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::config::EmailConfig;
use crate::error::{Result, TrackerError};

const REPORT_SUBJECT: &str = "Horizontal issue tracker output";

/// Render the complete mail message, headers included.
pub fn format_message(from: &str, to: &str, subject: &str, lines: &[String]) -> String {
    let mut message = String::new();
    message.push_str(&format!("From: Horizontal issue tracker <{from}>\n"));
    message.push_str(&format!("To: {to}\n"));
    message.push_str(&format!("Subject: {subject}\n"));
    message.push('\n');
    message.push_str(&lines.join("\n"));
    message.push_str("\n\nProduced by https://github.com/w3c/horizontal-tracker\n");
    message
}

async fn pipe_to_sendmail(cfg: &EmailConfig, message: String) -> Result<()> {
    let mut child = Command::new(&cfg.sendmail)
        .arg("-t")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(message.as_bytes()).await?;
    }
    let status = child.wait().await?;
    if !status.success() {
        return Err(TrackerError::Config(format!(
            "{} exited with {status}",
            cfg.sendmail
        )));
    }
    Ok(())
}

/// Mail the run's log lines.
pub async fn send_report(cfg: &EmailConfig, lines: &[String]) -> Result<()> {
    let message = format_message(&cfg.from, &cfg.to, REPORT_SUBJECT, lines);
    pipe_to_sendmail(cfg, message).await
}

/// Mail a short notice that the pass itself blew up.
pub async fn send_error_notice(cfg: &EmailConfig, error: &str) -> Result<()> {
    let message = format_message(
        &cfg.from,
        &cfg.to,
        "Horizontal issue tracker error",
        &[format!("You might want to look at: {error}")],
    );
    pipe_to_sendmail(cfg, message).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_has_headers_and_body() {
        let message = format_message(
            "tracker@example.org",
            "team@example.org",
            "subject line",
            &["[log] first".to_string(), "[warn] second".to_string()],
        );
        assert!(message.starts_with("From: Horizontal issue tracker <tracker@example.org>\n"));
        assert!(message.contains("To: team@example.org\n"));
        assert!(message.contains("Subject: subject line\n"));
        let body = message.split_once("\n\n").expect("blank line").1;
        assert!(body.starts_with("[log] first\n[warn] second"));
        assert!(body.contains("Produced by"));
    }

    #[test]
    fn test_empty_log_still_renders() {
        let message = format_message("a@b", "c@d", "s", &[]);
        assert!(message.contains("\n\n"));
    }
}
