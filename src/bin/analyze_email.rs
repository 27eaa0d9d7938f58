//! Sends one email to a running server and prints the verdict: the same
//! request the browser extension makes.
//!
//! Usage: `analyze_email <subject> [body]` (body is read from stdin when
//! omitted or `-`). `PHISHING_API_URL` overrides the endpoint.

use anyhow::{bail, Context};
use serde_json::{json, Value};
use std::io::Read;
use std::time::Duration;

use phishing_detector::AnalysisResult;

const DEFAULT_URL: &str = "http://127.0.0.1:5000/analyze";
const HIGH_RISK_WARNING: &str =
    "Warning: High risk detected. Avoid clicking links or downloading attachments.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let url = std::env::var("PHISHING_API_URL").unwrap_or_else(|_| DEFAULT_URL.to_string());

    let mut args = std::env::args().skip(1);
    let subject = args
        .next()
        .context("usage: analyze_email <subject> [body | -]")?;
    let body = match args.next() {
        Some(b) if b != "-" => b,
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading body from stdin")?;
            buf
        }
    };

    let client = reqwest::Client::builder()
        .user_agent("phishing-detector-cli/0.1")
        .connect_timeout(Duration::from_secs(4))
        .timeout(Duration::from_secs(30))
        .build()?;

    tracing::debug!(%url, "sending email to backend");
    let resp = client
        .post(&url)
        .json(&json!({ "subject": subject, "body": body }))
        .send()
        .await
        .with_context(|| format!("Cannot connect to the local analysis server ({url}). Is it running?"))?;

    let status = resp.status();
    if !status.is_success() {
        // Try to get the error message from the backend response body
        let mut msg = format!("Backend Error: {status}");
        if let Ok(v) = resp.json::<Value>().await {
            if let Some(e) = v.get("error").and_then(Value::as_str) {
                msg.push_str(" - ");
                msg.push_str(e);
            }
        }
        bail!(msg);
    }

    let result: AnalysisResult = resp.json().await.context("decoding backend response")?;
    println!(
        "risk: {} | phishing: {} | confidence: {:.1}% | raw score: {:.4}",
        result.risk_level,
        if result.is_phishing { "yes" } else { "no" },
        result.confidence,
        result.raw_score
    );
    if result.is_high_risk() {
        println!("{HIGH_RISK_WARNING}");
    }
    Ok(())
}
