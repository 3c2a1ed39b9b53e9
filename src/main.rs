use colored::Colorize;
use futures::StreamExt;
use std::io::Write;
use tokio_util::sync::CancellationToken;

use glm_content_adapter::llm::{
    Content, ContentGenerator, GenerateContentParameters, GlmContentGenerator, Part, UsageMetadata,
};
use glm_content_adapter::logging;

const USAGE: &str = "Usage: glm-chat [--search] <prompt>";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging system
    let _guard = logging::init_logging()?;

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let search = args.first().map(|a| a == "--search").unwrap_or(false);
    if search {
        args.remove(0);
    }

    let prompt = args.join(" ");
    if prompt.trim().is_empty() {
        eprintln!("{}", USAGE);
        std::process::exit(2);
    }

    tracing::info!("=== GLM Chat Starting ===");

    let generator = GlmContentGenerator::from_env()?;

    // Ctrl-C aborts the in-flight call
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    if search {
        let outcome = generator.web_search(&prompt, Some(&cancel)).await?;
        println!("{}", outcome.llm_content);
        eprintln!("{}", outcome.return_display.dimmed());
        return Ok(());
    }

    let params = GenerateContentParameters::new(
        generator.config().default_model.clone(),
        vec![Content::user_text(prompt)],
    )
    .with_abort_signal(cancel);

    let mut stream = generator.generate_content_stream(params).await?;
    let mut stdout = std::io::stdout();
    let mut usage: Option<UsageMetadata> = None;
    let mut in_thought = false;

    while let Some(fragment) = stream.next().await {
        let fragment = fragment?;
        for part in fragment.parts() {
            match part {
                Part::Thought { text } => {
                    in_thought = true;
                    print!("{}", text.dimmed());
                }
                Part::Text { text } => {
                    if in_thought {
                        println!();
                        in_thought = false;
                    }
                    print!("{}", text);
                }
                Part::FunctionCall(call) => {
                    println!("\n{} {}({})", "tool call:".cyan(), call.name, call.args);
                }
                _ => {}
            }
        }
        stdout.flush()?;

        if fragment.usage_metadata.is_some() {
            usage = fragment.usage_metadata.clone();
        }
    }
    println!();

    if let Some(usage) = usage {
        let summary = format!(
            "tokens: {} prompt, {} output, {} total",
            usage.prompt_token_count, usage.candidates_token_count, usage.total_token_count
        );
        eprintln!("{}", summary.dimmed());
    }

    tracing::info!("=== GLM Chat Shutting Down ===");

    Ok(())
}
