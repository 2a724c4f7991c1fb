//! scalecheck binary entry point

use anyhow::Context as _;
use clap::{value_parser, Arg, ArgMatches, Command};
use scalecheck_cloud::{GcloudProbe, GcloudSchedulerJobs, ScriptDeployer, TerraformCli};
use scalecheck_core::config::HarnessConfig;
use scalecheck_core::scenario::{
    run_scheduled_job_scenario, run_script_deploy_scenario, ScenarioParams, DEFAULT_CLUSTER_NAME,
};
use scalecheck_core::stages::{StageRunner, StageStore};
use scalecheck_core::types::RetryPolicy;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Command::new("scalecheck")
        .version(scalecheck_core::VERSION)
        .about("End-to-end convergence checks for autoscaled clusters")
        .subcommand_required(true)
        .subcommand(
            Command::new("run")
                .about("Run one end-to-end scenario")
                .arg(
                    Arg::new("topology")
                        .long("topology")
                        .required(true)
                        .value_parser(["scheduled-job", "script-deploy"])
                        .help("How the reconfiguration step is performed"),
                )
                .arg(
                    Arg::new("terraform-dir")
                        .long("terraform-dir")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory holding the infrastructure declaration"),
                )
                .arg(
                    Arg::new("cluster-name")
                        .long("cluster-name")
                        .default_value(DEFAULT_CLUSTER_NAME)
                        .help("Name of the clustered resource under test"),
                )
                .arg(
                    Arg::new("starting-size")
                        .long("starting-size")
                        .default_value("1")
                        .value_parser(value_parser!(u32))
                        .help("Shard count the deployment is provisioned with"),
                )
                .arg(
                    Arg::new("target-size")
                        .long("target-size")
                        .default_value("3")
                        .value_parser(value_parser!(u32))
                        .help("Shard count the reconfiguration requests"),
                )
                .arg(
                    Arg::new("retries")
                        .long("retries")
                        .default_value("30")
                        .value_parser(value_parser!(u32).range(1..))
                        .help("Probe attempts per convergence wait"),
                )
                .arg(
                    Arg::new("interval-secs")
                        .long("interval-secs")
                        .default_value("30")
                        .value_parser(value_parser!(u64))
                        .help("Seconds between probe attempts"),
                )
                .arg(
                    Arg::new("deploy-script")
                        .long("deploy-script")
                        .value_parser(value_parser!(PathBuf))
                        .help("Deploy program for the script-deploy topology"),
                )
                .arg(
                    Arg::new("workspace")
                        .long("workspace")
                        .default_value(StageStore::DEFAULT_DIR)
                        .value_parser(value_parser!(PathBuf))
                        .help("Directory for stage markers and inter-stage state"),
                ),
        );

    match cli.get_matches().subcommand() {
        Some(("run", args)) => run_cmd(args).await,
        _ => unreachable!("subcommand is required"),
    }
}

async fn run_cmd(args: &ArgMatches) -> anyhow::Result<()> {
    let config = HarnessConfig::from_env()?;

    let retries = *args.get_one::<u32>("retries").unwrap();
    let interval = *args.get_one::<u64>("interval-secs").unwrap();
    let policy = RetryPolicy::new(
        NonZeroU32::new(retries).context("--retries must be at least 1")?,
        Duration::from_secs(interval),
    );

    let params = ScenarioParams::new(args.get_one::<PathBuf>("terraform-dir").unwrap())
        .with_cluster_name(args.get_one::<String>("cluster-name").unwrap())
        .with_sizes(
            *args.get_one::<u32>("starting-size").unwrap(),
            *args.get_one::<u32>("target-size").unwrap(),
        )
        .with_policy(policy);

    let runner = StageRunner::new(StageStore::new(
        args.get_one::<PathBuf>("workspace").unwrap(),
    ));
    let terraform = TerraformCli::new();
    let probe = GcloudProbe::new();

    let topology = args.get_one::<String>("topology").unwrap();
    let report = match topology.as_str() {
        "scheduled-job" => {
            let jobs = GcloudSchedulerJobs::new();
            run_scheduled_job_scenario(&config, &terraform, &probe, &jobs, &runner, &params)
                .await?
        }
        "script-deploy" => {
            let script = args
                .get_one::<PathBuf>("deploy-script")
                .context("--deploy-script is required for the script-deploy topology")?;
            let deployer = ScriptDeployer::new(script);
            run_script_deploy_scenario(&config, &terraform, &probe, &deployer, &runner, &params)
                .await?
        }
        other => unreachable!("clap validated topology {other}"),
    };

    tracing::info!(
        "scenario finished: setup {:?}, apply {:?}, validate {:?}, teardown {:?}",
        report.setup,
        report.apply,
        report.validate,
        report.teardown
    );
    if let Some(polls) = report.polls {
        tracing::info!(
            "convergence took {} then {} probe attempts",
            polls.to_starting,
            polls.to_target
        );
    }
    Ok(())
}
