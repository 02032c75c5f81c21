//! Experiment commands: assign, ab-test and summary

use clap::Args;

use super::print_json;
use super::request::PromptArgs;
use crate::App;

#[derive(Args, Clone, Debug)]
pub struct AssignArgs {
    pub experiment: String,

    pub user: String,

    #[arg(long)]
    pub organization: Option<String>,
}

#[derive(Args, Clone, Debug)]
pub struct AbTestArgs {
    pub experiment: String,

    pub user: String,

    #[arg(long)]
    pub organization: Option<String>,

    #[command(flatten)]
    pub prompt: PromptArgs,
}

#[derive(Args, Clone, Debug)]
pub struct SummaryArgs {
    /// Experiment to summarize; lists all experiments when omitted
    pub experiment: Option<String>,

    /// Drive this many synthetic users through the experiment first
    #[arg(long, default_value_t = 0, requires = "prompt")]
    pub sample_users: usize,

    /// Prompt sent by each synthetic user
    #[arg(long)]
    pub prompt: Option<String>,
}

/// Prints the assignment, or `null` for an unknown or inactive experiment
pub async fn assign(app: &App, args: AssignArgs) -> anyhow::Result<()> {
    let assignment = app
        .experiments
        .get_variant_for_user(&args.experiment, &args.user, args.organization.as_deref())
        .await?;

    print_json(&assignment)
}

pub async fn ab_test(app: &App, args: AbTestArgs) -> anyhow::Result<()> {
    let request = args.prompt.to_request();
    let outcome = app
        .experiments
        .execute_with_ab_test(
            &args.experiment,
            &args.user,
            args.organization.as_deref(),
            &request,
        )
        .await?;

    print_json(&outcome)
}

pub async fn summary(app: &App, args: SummaryArgs) -> anyhow::Result<()> {
    let Some(experiment) = args.experiment else {
        return print_json(&app.experiments.list_experiments().await);
    };

    if let Some(prompt) = &args.prompt {
        let request = crate::domain::UnifiedRequest::from_prompt(prompt.clone());

        for i in 0..args.sample_users {
            let user = format!("sample-user-{}", i);
            if let Err(e) = app
                .experiments
                .execute_with_ab_test(&experiment, &user, None, &request)
                .await
            {
                tracing::warn!(user = %user, error = %e, "Sample execution failed");
            }
        }
    }

    match app.experiments.summarize(&experiment).await? {
        Some(summary) => print_json(&summary),
        None => anyhow::bail!("unknown experiment '{}'", experiment),
    }
}
