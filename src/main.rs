use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use dialoguer::{Confirm, Input, Select};
use skillsmith_core::bootstrap::create_judge_provider;
use skillsmith_core::config::Config;
use skillsmith_core::{AdvanceOutcome, ElicitError, RecommendedOption, Registry, SkillDraft};
use skillsmith_llm::{AnyProvider, LlmProvider};
use skillsmith_skills::{ProgressiveToolSurface, SkillScope, ToolCall, format_metadata_prompt};
use tokio::sync::watch;

#[derive(Parser)]
#[command(name = "skillsmith", version)]
#[command(about = "Create skills through guided Q&A and serve them by progressive disclosure")]
struct Cli {
    /// Config file path (default: SKILLSMITH_CONFIG or config/default.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query the skill registry the way an agent would.
    Skills {
        #[command(subcommand)]
        command: SkillsCommand,
    },

    /// Define a new skill interactively, scored by the judge model.
    Create {
        /// Session owner id
        #[arg(long, default_value = "local")]
        owner: String,
    },
}

#[derive(Subcommand)]
enum SkillsCommand {
    /// List skill names and descriptions.
    List {
        #[arg(long, default_value = "external")]
        scope: SkillScope,
        /// Print the system-prompt block instead of a plain list
        #[arg(long)]
        prompt: bool,
    },
    /// Print a skill's full instructions and register its functions.
    Show {
        name: String,
        #[arg(long, default_value = "external")]
        scope: SkillScope,
    },
    /// Print a reference document of a skill.
    Reference {
        name: String,
        file: String,
        #[arg(long, default_value = "external")]
        scope: SkillScope,
    },
    /// List a skill's references, assets and scripts.
    Resources {
        name: String,
        #[arg(long, default_value = "external")]
        scope: SkillScope,
    },
    /// Print the absolute path of a skill's scripts, assets or references directory.
    Path {
        name: String,
        #[arg(value_name = "TYPE")]
        resource_type: String,
        #[arg(long, default_value = "external")]
        scope: SkillScope,
    },
    /// Print the tool definitions offered to an agent.
    Tools,
    /// Invoke one tool by id with JSON parameters.
    Call {
        tool_id: String,
        #[arg(default_value = "{}")]
        params: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber();

    let config_path = resolve_config_path(cli.config.as_deref());
    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::debug!(
        path = %config_path.display(),
        root = %config.skills.root.display(),
        "config loaded"
    );

    let provider = create_judge_provider(&config)?;
    let registry = Registry::from_config(&config, provider);

    match cli.command {
        Commands::Skills { command } => run_skills(registry.surface(), command),
        Commands::Create { owner } => {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            let sweeper = registry
                .sessions()
                .spawn_sweeper(config.sweep_interval(), shutdown_rx);
            let result = run_create(&registry, &owner).await;
            let _ = shutdown_tx.send(true);
            let _ = sweeper.await;
            result
        }
    }
}

fn init_subscriber() {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn resolve_config_path(cli_path: Option<&Path>) -> PathBuf {
    if let Some(path) = cli_path {
        return path.to_path_buf();
    }
    if let Ok(path) = std::env::var("SKILLSMITH_CONFIG") {
        return PathBuf::from(path);
    }
    PathBuf::from("config/default.toml")
}

fn run_skills(surface: &ProgressiveToolSurface, command: SkillsCommand) -> anyhow::Result<()> {
    match command {
        SkillsCommand::List { scope, prompt } => {
            let skills = surface.list_available_skills(scope);
            if prompt {
                print!("{}", format_metadata_prompt(&skills));
            } else if skills.is_empty() {
                println!("No {scope} skills found.");
            } else {
                for skill in &skills {
                    println!("{} [{}]: {}", skill.name, skill.scope, skill.description);
                }
            }
        }
        SkillsCommand::Show { name, scope } => {
            let loaded = surface.load_skill_instructions(&name, scope)?;
            println!("{}", loaded.instructions.body);
            if !loaded.registration.registered.is_empty() {
                eprintln!(
                    "registered functions: {}",
                    loaded.registration.registered.join(", ")
                );
            }
        }
        SkillsCommand::Reference { name, file, scope } => {
            println!("{}", surface.load_skill_reference(&name, &file, scope)?);
        }
        SkillsCommand::Resources { name, scope } => {
            println!("{}", surface.list_skill_resources(&name, scope)?);
        }
        SkillsCommand::Path {
            name,
            resource_type,
            scope,
        } => {
            let path = surface.get_skill_resource_path(&name, &resource_type, scope)?;
            println!("{}", path.display());
        }
        SkillsCommand::Tools => {
            for def in ProgressiveToolSurface::tool_definitions() {
                println!("{}: {}", def.id, def.description);
                println!("{}\n", serde_json::to_string_pretty(&def.schema)?);
            }
        }
        SkillsCommand::Call { tool_id, params } => {
            let params: HashMap<String, serde_json::Value> =
                serde_json::from_str(&params).context("tool parameters must be a JSON object")?;
            println!("{}", surface.dispatch(&ToolCall { tool_id, params })?);
        }
    }
    Ok(())
}

const STOP_COMMAND: &str = "/stop";

async fn run_create(registry: &Registry<AnyProvider>, owner: &str) -> anyhow::Result<()> {
    let sessions = registry.sessions();
    tracing::info!(
        judge = sessions.judge().provider().name(),
        "starting skill elicitation"
    );

    let created = sessions.create_session(owner);
    let session_id = created.session_id;
    println!(
        "\n[{}/{}] {}",
        created.progress.current, created.progress.total, created.prompt.guidance
    );
    println!("{}", created.prompt.question);
    println!("  {}", created.prompt.placeholder);
    println!("(type {STOP_COMMAND} to finish early)\n");

    let mut options: Vec<RecommendedOption> = Vec::new();
    loop {
        let Some(answer) = read_answer(&options)? else {
            let ended = sessions.end_session(session_id, owner).await?;
            println!("\nSession ended before every topic was covered.");
            return offer_publish(registry, &ended.skill_metadata);
        };

        match sessions.chat(session_id, owner, &answer).await {
            Ok(AdvanceOutcome::FollowUp {
                follow_up_question,
                guidance,
                recommended_options,
                score,
                reasoning,
                progress,
                ..
            }) => {
                println!(
                    "\n[{}/{}] score {score}. {reasoning}",
                    progress.current, progress.total
                );
                println!("{follow_up_question}");
                println!("{guidance}\n");
                options = recommended_options;
            }
            Ok(AdvanceOutcome::NextDimension {
                prompt, progress, ..
            }) => {
                println!(
                    "\n[{}/{}] {}",
                    progress.current, progress.total, prompt.guidance
                );
                println!("{}", prompt.question);
                println!("  {}\n", prompt.placeholder);
                options.clear();
            }
            Ok(AdvanceOutcome::Summary {
                message,
                skill_metadata,
                next_step,
                ..
            }) => {
                println!("\n{message}");
                println!("{}", serde_json::to_string_pretty(&skill_metadata)?);
                println!("{next_step}");
                sessions.end_session(session_id, owner).await?;
                return offer_publish(registry, &skill_metadata);
            }
            Err(ElicitError::EmptyAnswer) => println!("Please enter an answer."),
            Err(e) => return Err(e.into()),
        }
    }
}

/// `None` when the user chose to stop.
fn read_answer(options: &[RecommendedOption]) -> anyhow::Result<Option<String>> {
    if !options.is_empty() {
        let mut items: Vec<&str> = options.iter().map(|o| o.text.as_str()).collect();
        items.push("Write my own answer");
        items.push("Stop here");
        let choice = Select::new()
            .with_prompt("Pick an answer")
            .items(&items)
            .default(0)
            .interact()?;
        if let Some(option) = options.get(choice) {
            return Ok(Some(option.text.clone()));
        }
        if choice == options.len() + 1 {
            return Ok(None);
        }
    }

    let text: String = Input::new()
        .with_prompt("Your answer")
        .allow_empty(true)
        .interact_text()?;
    if text.trim() == STOP_COMMAND {
        return Ok(None);
    }
    Ok(Some(text))
}

fn offer_publish(registry: &Registry<AnyProvider>, draft: &SkillDraft) -> anyhow::Result<()> {
    let publish = Confirm::new()
        .with_prompt(format!("Publish skill '{}'?", draft.skill_name))
        .default(true)
        .interact()?;
    if !publish {
        println!("Draft discarded.");
        return Ok(());
    }
    let path = registry.publish_draft(draft)?;
    println!("Skill written to {}", path.display());
    Ok(())
}
