// src/utils/notify.rs: completion/failure email, never fatal

use log::{info, warn};

use crate::config::defs::{RunConfig, MAIL_TAG, SENDMAIL_TAG};
use crate::utils::streams::run_tool_with_input;

/// Sends the end-of-run notification to the configured recipients.
/// `--email` is notified for every outcome, `--email_on_fail` only on
/// failure. Delivery goes through sendmail first and falls back to
/// mail(1); any failure is logged as a warning and swallowed, a lost mail
/// must never change the pipeline's exit status.
pub async fn send_run_notification(config: &RunConfig, success: bool, summary: &str) {
    let mut recipients: Vec<&String> = Vec::new();
    if let Some(addr) = &config.args.email {
        recipients.push(addr);
    }
    if !success {
        if let Some(addr) = &config.args.email_on_fail {
            if !recipients.contains(&addr) {
                recipients.push(addr);
            }
        }
    }
    if recipients.is_empty() {
        return;
    }

    let run_name = config
        .args
        .run_name
        .clone()
        .unwrap_or_else(|| "bactyper".to_string());
    let outcome = if success { "completed successfully" } else { "FAILED" };
    let subject = format!("[bactyper-pipelines] run {} {}", run_name, outcome);

    for addr in recipients {
        if deliver(addr, &subject, summary).await {
            info!("Notification sent to {}", addr);
        } else {
            warn!("Giving up on notifying {}", addr);
        }
    }
}

async fn deliver(addr: &str, subject: &str, body: &str) -> bool {
    let message = format!("To: {}\nSubject: {}\n\n{}\n", addr, subject, body);
    match run_tool_with_input(SENDMAIL_TAG, &["-t".to_string()], &message).await {
        Ok(()) => return true,
        Err(e) => {
            warn!("sendmail delivery to {} failed: {}; trying mail(1)", addr, e);
        }
    }

    let mail_args = vec!["-s".to_string(), subject.to_string(), addr.to_string()];
    match run_tool_with_input(MAIL_TAG, &mail_args, body).await {
        Ok(()) => true,
        Err(e) => {
            warn!("mail delivery to {} failed: {}", addr, e);
            false
        }
    }
}
