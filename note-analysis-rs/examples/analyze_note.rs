//! Note Analysis Example
//!
//! Runs the full review-gated pipeline on a note stored as JSON and prints
//! progress and the final report.
//!
//! To run this example:
//! ```
//! NOTES_AI_PROVIDER=deepseek NOTES_DEEPSEEK_API_KEY=your_api_key \
//!     cargo run --example analyze_note -- note.json
//! ```
//!
//! The note file uses the app's field names: `id`, `title`, `content`,
//! `images`, `categoryName`, `curveName`, `curveIntervals`, `stage`,
//! `nextReviewDate` and `createdAt`.

use std::io::Write;

use anyhow::Context;
use note_analysis_rs::config::DEFAULT_PROVIDER;
use note_analysis_rs::{
    analyze_note, AgentRole, AnalysisSettings, CallbackSink, NoteRecord, ProviderProfile,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // Initialize logging
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let path = std::env::args()
        .nth(1)
        .context("usage: analyze_note <note.json>")?;
    let raw = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path))?;
    let note: NoteRecord = serde_json::from_str(&raw).context("parsing note JSON")?;

    let settings = AnalysisSettings::from_provider(&**DEFAULT_PROVIDER)?;
    let profile = ProviderProfile::from_provider(settings.provider, &**DEFAULT_PROVIDER);

    println!("Analyzing \"{}\" with {} ({})", note.title, profile.kind(), profile.endpoint().model);

    let sink = CallbackSink::new()
        .with_progress(|message| println!("\n{}", message))
        .with_agent_stream(|agent, partial| {
            // Only the summary is echoed live; other agents would flood the terminal
            if agent == AgentRole::Summary {
                print!("\r{} chars of summary", partial.chars().count());
                let _ = std::io::stdout().flush();
            }
        });

    match analyze_note(&settings, profile, &note, &sink).await {
        Ok(result) => {
            println!("\n\n{}", result.to_markdown());
            if !result.review_passed {
                println!("\n(review did not pass after {} attempts)", result.attempts);
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("\n{}", e.user_message());
            Err(e.into())
        }
    }
}
