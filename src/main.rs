use std::process::ExitCode;

use deployment::Deployment;
use provider::plan::PlanProvider;

mod cli;
mod components;
mod deployment;
mod output;
mod provider;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize the logger
    env_logger::init();

    let args = cli::get_cli_args();

    let deployment = match Deployment::load(&args.config) {
        Ok(deployment) => deployment,
        Err(e) => {
            log::error!("Unable to load {:?}: {e}", args.config);
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let settings = deployment.provider_settings();
    let provider = PlanProvider::new(
        &deployment.stack_name(),
        &settings.region,
        &settings.account_id,
    );

    if let Err(e) = deployment.apply(&provider).await {
        log::error!("Deployment {} failed: {e}", deployment.stack_name());
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    let plan = provider.into_plan();
    log::info!(
        "Planned {} resource(s) and {} output(s) for {}",
        plan.resources.len(),
        plan.outputs.len(),
        plan.stack
    );

    let rendered = match serde_json::to_string_pretty(&plan) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Unable to render plan: {e}");
            return ExitCode::FAILURE;
        }
    };

    match &args.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, rendered) {
                eprintln!("Unable to write plan to {path:?}: {e}");
                return ExitCode::FAILURE;
            }
            log::info!("Plan written to {path:?}");
        }
        None => println!("{rendered}"),
    }

    ExitCode::SUCCESS
}
