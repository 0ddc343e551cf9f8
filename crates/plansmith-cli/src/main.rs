mod config;
mod discovery_cmd;
mod generate_cmd;
mod materialize_cmd;
mod provision_cmd;
mod signal;
mod status_cmd;
#[cfg(test)]
mod test_util;

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use plansmith_core::graph::GraphGateway;
use plansmith_core::materialize::{BucketConflictPolicy, MaterializeOptions};
use plansmith_core::provision::ProvisionRequest;

use config::PlansmithConfig;

#[derive(Parser)]
#[command(
    name = "plansmith",
    about = "Generate event plans and materialize them into Microsoft Planner"
)]
struct Cli {
    /// Graph API root (overrides PLANSMITH_GRAPH_URL env var)
    #[arg(long, global = true)]
    graph_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a plansmith config file
    Init {
        /// Azure AD tenant id
        #[arg(long)]
        tenant_id: String,
        /// App registration client id
        #[arg(long)]
        client_id: String,
        /// App registration client secret
        #[arg(long)]
        client_secret: String,
        /// Default plan for `materialize`
        #[arg(long)]
        plan_id: Option<String>,
        /// Azure OpenAI resource endpoint
        #[arg(long)]
        openai_endpoint: Option<String>,
        /// Azure OpenAI API key
        #[arg(long)]
        openai_api_key: Option<String>,
        /// Azure OpenAI deployment name
        #[arg(long)]
        openai_deployment: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Generate an event plan and print it as JSON
    Generate {
        /// What the plan should accomplish
        #[arg(long)]
        goal: Option<String>,
        /// Generation attempts before giving up on malformed output
        #[arg(long, default_value_t = 3)]
        attempts: u32,
    },
    /// Create a bucket and its tasks from an event plan
    Materialize {
        /// Read the plan from a JSON file instead of generating one
        #[arg(long, conflicts_with = "goal")]
        file: Option<PathBuf>,
        /// Goal to generate a plan for
        #[arg(long)]
        goal: Option<String>,
        /// Target plan (overrides PLANSMITH_PLAN_ID env var)
        #[arg(long)]
        plan_id: Option<String>,
        /// Reuse a same-named bucket instead of failing
        #[arg(long)]
        reuse_bucket: bool,
        /// Days from now until each task is due
        #[arg(long, default_value_t = 7)]
        due_days: i64,
        /// Attempts per remote create call
        #[arg(long)]
        attempts: Option<u32>,
        /// Do not look for remotely created items after a failed call
        #[arg(long)]
        no_reconcile: bool,
    },
    /// Create a group, add members, and create a plan for it
    Provision {
        /// Group display name
        #[arg(long)]
        group: String,
        /// Group description
        #[arg(long, default_value = "")]
        description: String,
        /// Plan title
        #[arg(long)]
        plan_title: String,
        /// Member user principal name (repeatable)
        #[arg(long = "member")]
        members: Vec<String>,
    },
    /// Show completion progress for a bucket
    Status {
        /// Bucket id
        bucket_id: String,
        /// Print only the verdict; exit 1 unless every task is complete
        #[arg(long)]
        check: bool,
    },
    /// Mark a task complete or set its percent complete
    Complete {
        /// Task id
        task_id: String,
        /// Percent complete (0-100); omit to mark done
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..=100))]
        percent: Option<u8>,
    },
    /// List plans across all groups
    Plans,
    /// List SharePoint and OneDrive sites
    Sites,
}

/// Execute the `plansmith init` command: write config file.
fn cmd_init(cfg: config::ConfigFile, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(tenant) = &cfg.graph.tenant_id {
        println!("  graph.tenant_id = {tenant}");
    }
    if let Some(client) = &cfg.graph.client_id {
        println!("  graph.client_id = {client}");
    }
    println!("  graph.client_secret = (hidden)");
    if let Some(plan_id) = &cfg.planner.plan_id {
        println!("  planner.plan_id = {plan_id}");
    }
    if cfg.openai.endpoint.is_none() {
        println!();
        println!("No OpenAI endpoint configured; `plansmith materialize` will need --file.");
    }

    Ok(())
}

fn graph_gateway(
    config: &PlansmithConfig,
    cli_graph_url: Option<&str>,
) -> anyhow::Result<GraphGateway> {
    let graph = config.graph(cli_graph_url)?;
    Ok(GraphGateway::new(&graph)?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let graph_url = cli.graph_url.as_deref();
    let mut stdout = std::io::stdout();

    match cli.command {
        Commands::Init {
            tenant_id,
            client_id,
            client_secret,
            plan_id,
            openai_endpoint,
            openai_api_key,
            openai_deployment,
            force,
        } => {
            let cfg = config::ConfigFile {
                graph: config::GraphSection {
                    tenant_id: Some(tenant_id),
                    client_id: Some(client_id),
                    client_secret: Some(client_secret),
                    base_url: cli.graph_url.clone(),
                },
                openai: config::OpenAiSection {
                    endpoint: openai_endpoint,
                    api_key: openai_api_key,
                    deployment: openai_deployment,
                    api_version: None,
                },
                planner: config::PlannerSection { plan_id },
            };
            cmd_init(cfg, force)?;
        }
        Commands::Generate { goal, attempts } => {
            let config = PlansmithConfig::load()?;
            generate_cmd::run_generate(&config, goal.as_deref(), attempts, &mut stdout).await?;
        }
        Commands::Materialize {
            file,
            goal,
            plan_id,
            reuse_bucket,
            due_days,
            attempts,
            no_reconcile,
        } => {
            let config = PlansmithConfig::load()?;
            let plan_id = config.plan_id(plan_id.as_deref())?;
            let gateway = graph_gateway(&config, graph_url)?;

            let plan = match file {
                Some(path) => generate_cmd::read_plan_file(&path)?,
                None => {
                    let generator = generate_cmd::chat_generator(&config)?;
                    generate_cmd::generate_plan(&generator, goal.as_deref(), 3).await?
                }
            };

            let mut options = MaterializeOptions {
                due_offset_days: due_days,
                reconcile_on_retry: !no_reconcile,
                ..Default::default()
            };
            if reuse_bucket {
                options.on_bucket_conflict = BucketConflictPolicy::ReuseExisting;
            }
            if let Some(n) = attempts {
                options.retry.max_attempts = n.max(1);
            }

            let cancel = signal::cancel_on_ctrl_c();
            let code = materialize_cmd::run_materialize(
                &gateway, &plan_id, &plan, options, &cancel, &mut stdout,
            )
            .await?;
            stdout.flush()?;
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Provision {
            group,
            description,
            plan_title,
            members,
        } => {
            let config = PlansmithConfig::load()?;
            let gateway = graph_gateway(&config, graph_url)?;
            let request = ProvisionRequest {
                group_name: group,
                group_description: description,
                plan_title,
                members,
            };
            let cancel = signal::cancel_on_ctrl_c();
            provision_cmd::run_provision(&gateway, &request, &cancel, &mut stdout).await?;
        }
        Commands::Status { bucket_id, check } => {
            let config = PlansmithConfig::load()?;
            let gateway = graph_gateway(&config, graph_url)?;
            if check {
                if !status_cmd::run_check(&gateway, &bucket_id, &mut stdout).await? {
                    stdout.flush()?;
                    std::process::exit(1);
                }
            } else {
                status_cmd::run_status(&gateway, &bucket_id, &mut stdout).await?;
            }
        }
        Commands::Complete { task_id, percent } => {
            let config = PlansmithConfig::load()?;
            let gateway = graph_gateway(&config, graph_url)?;
            status_cmd::run_complete(&gateway, &task_id, percent, &mut stdout).await?;
        }
        Commands::Plans => {
            let config = PlansmithConfig::load()?;
            let gateway = graph_gateway(&config, graph_url)?;
            discovery_cmd::run_plans(&gateway, &mut stdout).await?;
        }
        Commands::Sites => {
            let config = PlansmithConfig::load()?;
            let gateway = graph_gateway(&config, graph_url)?;
            discovery_cmd::run_sites(&gateway, &mut stdout).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn complete_rejects_out_of_range_percent() {
        let parsed = Cli::try_parse_from(["plansmith", "complete", "task-1", "--percent", "150"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn materialize_file_and_goal_conflict() {
        let parsed = Cli::try_parse_from([
            "plansmith",
            "materialize",
            "--file",
            "plan.json",
            "--goal",
            "x",
        ]);
        assert!(parsed.is_err());
    }
}
