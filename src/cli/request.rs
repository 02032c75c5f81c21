//! Request commands: complete, stream and embed

use std::io::Write;

use clap::Args;
use futures::StreamExt;
use serde_json::json;

use super::print_json;
use crate::domain::{EmbeddingRequest, UnifiedRequest};
use crate::infrastructure::orchestrator::Route;
use crate::App;

/// Prompt and sampling options shared by completion commands
#[derive(Args, Clone, Debug)]
pub struct PromptArgs {
    /// User prompt
    pub prompt: String,

    /// System message sent before the prompt
    #[arg(long)]
    pub system: Option<String>,

    /// Model or model hint, mapped per provider
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long)]
    pub max_tokens: Option<u32>,

    #[arg(long)]
    pub temperature: Option<f32>,
}

impl PromptArgs {
    pub fn to_request(&self) -> UnifiedRequest {
        let mut builder = UnifiedRequest::builder();

        if let Some(system) = &self.system {
            builder = builder.system(system.clone());
        }
        builder = builder.user(self.prompt.clone());
        if let Some(model) = &self.model {
            builder = builder.model(model.clone());
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }

        builder.build()
    }
}

#[derive(Args, Clone, Debug)]
pub struct CompleteArgs {
    #[command(flatten)]
    pub prompt: PromptArgs,

    /// Only use this provider (no fallback)
    #[arg(long)]
    pub provider: Option<String>,

    /// Print per-provider cost estimates instead of dispatching
    #[arg(long)]
    pub estimate: bool,
}

#[derive(Args, Clone, Debug)]
pub struct EmbedArgs {
    /// Texts to embed
    #[arg(required = true, num_args = 1..)]
    pub texts: Vec<String>,

    #[arg(long)]
    pub model: Option<String>,

    /// Only use this provider (no fallback)
    #[arg(long)]
    pub provider: Option<String>,
}

fn route(provider: Option<String>) -> Route {
    provider.map(Route::Pinned).unwrap_or_default()
}

pub async fn complete(app: &App, args: CompleteArgs) -> anyhow::Result<()> {
    let request = args.prompt.to_request();
    let route = route(args.provider);

    if args.estimate {
        let estimates = app.orchestrator.estimate_costs(&request, &route).await?;
        let estimates: Vec<_> = estimates
            .into_iter()
            .map(|(provider, estimate)| json!({ "provider": provider, "estimate": estimate }))
            .collect();
        return print_json(&estimates);
    }

    let response = app.orchestrator.execute_completion(&request, &route).await?;
    print_json(&response)
}

/// Write deltas as they arrive, then a trailing newline
pub async fn stream(app: &App, args: CompleteArgs) -> anyhow::Result<()> {
    let request = args.prompt.to_request();
    let mut stream = app
        .orchestrator
        .stream_completion(&request, &route(args.provider))
        .await?;

    let mut stdout = std::io::stdout();
    let mut usage = None;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if let Some(delta) = &chunk.delta {
            write!(stdout, "{}", delta)?;
            stdout.flush()?;
        }
        if chunk.usage.is_some() {
            usage = chunk.usage;
        }
    }
    writeln!(stdout)?;

    tracing::info!(provider = %stream.provider(), model = %stream.model(), ?usage, "Stream finished");
    Ok(())
}

pub async fn embed(app: &App, args: EmbedArgs) -> anyhow::Result<()> {
    let mut request = match args.texts.len() {
        1 => EmbeddingRequest::single(args.texts[0].clone()),
        _ => EmbeddingRequest::batch(args.texts),
    };
    if let Some(model) = args.model {
        request = request.with_model(model);
    }

    let response = app
        .orchestrator
        .execute_embedding(&request, &route(args.provider))
        .await?;
    print_json(&response)
}
