use crate::infra::build_service;
use crate::server;
use chrono::SecondsFormat;
use clap::{Args, Parser, Subcommand};
use cosmetic_ranker::config::AppConfig;
use cosmetic_ranker::error::AppError;
use cosmetic_ranker::pipeline::{RecommendationRequest, RecommendationResponse};
use cosmetic_ranker::ranking::DEFAULT_TOP_N;
use cosmetic_ranker::rules::{RuleError, RuleStore};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Cosmetic Ranker",
    about = "Medication-aware cosmetic recommendations from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Inspect the configured ruleset
    Rules {
        #[command(subcommand)]
        command: RulesCommand,
    },
    /// Rank the bundled demo catalog for one request
    Recommend(RecommendArgs),
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Validate a rule file, or the configured source when no path is given
    Validate(ValidateArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

#[derive(Args, Debug)]
pub(crate) struct ValidateArgs {
    /// JSON or CSV rule file
    #[arg(long)]
    pub(crate) path: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct RecommendArgs {
    /// Intent tag, repeatable
    #[arg(long = "intent")]
    pub(crate) intents: Vec<String>,
    /// ATC code or MULTI: alias, repeatable
    #[arg(long = "med")]
    pub(crate) medications: Vec<String>,
    #[arg(long, default_value_t = DEFAULT_TOP_N)]
    pub(crate) top_n: usize,
    /// Case-insensitive category filter
    #[arg(long)]
    pub(crate) category: Option<String>,
    /// Pregnant or lactating
    #[arg(long)]
    pub(crate) preg_lact: bool,
    /// Product is washed off after use
    #[arg(long)]
    pub(crate) rinse_off: bool,
    /// Product is used during the day
    #[arg(long)]
    pub(crate) day_use: bool,
}

impl RecommendArgs {
    fn into_request(self) -> RecommendationRequest {
        let mut request = RecommendationRequest {
            intent_tags: self.intents,
            medications: self.medications,
            top_n: self.top_n,
            category_like: self.category,
            preg_lact: self.preg_lact,
            ..RecommendationRequest::default()
        };
        request.usage.leave_on = !self.rinse_off;
        request.usage.day_use = self.day_use;
        request.usage.face = true;
        request
    }
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Rules {
            command: RulesCommand::Validate(args),
        } => validate_rules(args),
        Command::Recommend(args) => recommend(args).await,
    }
}

fn validate_rules(args: ValidateArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?.rules;
    if let Some(path) = args.path {
        config.source_path = Some(path);
    }
    let store = RuleStore::from_config(config);
    let report = store.validate()?;

    println!("Rule source: {}", store.source_description());
    println!("Result: {}", report.summary());
    for issue in &report.issues {
        println!("  issue: {issue}");
    }
    for warning in &report.warnings {
        println!("  warning: {warning}");
    }

    if report.valid {
        Ok(())
    } else {
        Err(RuleError::Invalid(report).into())
    }
}

async fn recommend(args: RecommendArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config)?;
    let result = service.recommend(args.into_request()).await;
    service.close().await;
    println!("{}", render_response(&result?));
    Ok(())
}

pub(crate) fn render_response(response: &RecommendationResponse) -> String {
    let mut lines = vec![format!(
        "Request {} (ruleset {}, generated {})",
        response.request_id,
        response.stats.ruleset_version,
        response
            .generated_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )];

    if response.recommendations.is_empty() {
        lines.push("No recommendations.".to_string());
    }
    for item in &response.recommendations {
        lines.push(format!(
            "{:>2}. {} ({}, {}) score {:.1}, penalty {}",
            item.rank,
            item.candidate.name,
            item.candidate.brand,
            item.candidate.category,
            item.final_score,
            item.penalty_score
        ));
        for reason in &item.reasons {
            lines.push(format!("      - {reason}"));
        }
    }

    for excluded in &response.excluded {
        lines.push(format!(
            "Excluded {}: {}",
            excluded.id,
            excluded.reasons.join("; ")
        ));
    }
    for warning in &response.stats.warnings {
        lines.push(format!("Warning: {warning}"));
    }
    lines.join("\n")
}
