// Manual smoke test against a live provider:
//   GEMINI_API_KEY=... cargo run --bin probe_llm
use std::sync::Arc;

use common::{PipelineConfig, RemoteLlmConfig};
use macrolens::agents::{AnalysisAgent, ScoutAgent};
use macrolens::llm::factory::{create_llm_provider, Adapter};
use macrolens::llm::LlmProvider;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let adapter = Adapter::parse(&std::env::var("LLM_ADAPTER").unwrap_or_else(|_| "gemini".to_string()))?;
    let cfg = RemoteLlmConfig {
        api_url: std::env::var("LLM_BASE_URL").ok(),
        api_key_env: std::env::var("LLM_API_KEY_ENV").ok(),
        model: std::env::var("LLM_MODEL").ok(),
        timeout_seconds: Some(180),
        ..RemoteLlmConfig::default()
    };
    let provider = create_llm_provider(adapter, &cfg)?;

    println!("\n{}", "=".repeat(60));
    println!("Probing LLM provider");
    println!("Adapter: {:?}", adapter);
    println!("Model: {}", provider.model());
    println!("{}", "=".repeat(60));

    let pipeline = PipelineConfig {
        news_count: 3,
        ..PipelineConfig::default()
    };

    println!("\n[Step 1] Scouting news...");
    let news = match ScoutAgent::new(Arc::clone(&provider), &pipeline).run().await {
        Ok(text) => {
            println!("✓ Success! {} chars", text.len());
            println!("{}", text.chars().take(600).collect::<String>());
            text
        }
        Err(e) => {
            eprintln!("✗ Failed: {}", e);
            return Ok(());
        }
    };

    println!("\n[Step 2] Structured analysis...");
    match AnalysisAgent::new(provider).run(&news).await {
        Ok(result) => {
            println!("✓ Success! {} items", result.len());
            for (i, item) in result.macro_analysis.iter().enumerate() {
                println!(
                    "  {}. {} [{}] score={:?}",
                    i + 1,
                    item.news_summary,
                    item.identified_macro_factors.join(", "),
                    item.importance_score
                );
            }
        }
        Err(e) => eprintln!("✗ Failed: {}", e),
    }

    println!("\n{}", "=".repeat(60));
    println!("Probe completed");
    println!("{}", "=".repeat(60));
    Ok(())
}
