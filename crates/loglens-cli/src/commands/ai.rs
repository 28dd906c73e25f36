//! AI backend status command

use anyhow::Result;
use loglens_core::{AIClient, AiDispatcher};

/// Report which AI backend is configured and whether it answers
pub async fn cmd_ai_status() -> Result<()> {
    println!("🔍 Checking AI backend...\n");

    let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());
    println!("  AI_BACKEND: {}", backend);

    let Some(client) = AIClient::from_env() else {
        println!("  ⚠️  OLLAMA_HOST not set, AI follow-ups are disabled\n");
        println!("To set up Ollama:");
        println!("  1. Install Ollama: https://ollama.ai/download");
        println!("  2. Start the server: ollama serve");
        println!("  3. Pull a model: ollama pull llama3.2");
        println!("  4. Set environment variable: export OLLAMA_HOST=http://localhost:11434");
        return Ok(());
    };

    println!("  Host: {}", client.host());
    println!("  Model: {}\n", client.model());

    print!("Checking availability... ");
    if client.health_check().await {
        println!("✅ Connected");
    } else {
        println!("❌ Failed");
        println!("\n⚠️  Could not reach {}", client.host());
    }

    Ok(())
}
