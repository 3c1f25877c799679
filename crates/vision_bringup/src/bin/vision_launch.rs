//! Vision Launch CLI
//!
//! Usage:
//!   vision_launch
//!   vision_launch use_mock_camera:=true rviz:=true
//!   vision_launch --show-args
//!   vision_launch my_robot.launch.yaml -a rviz:=true --dry-run

use std::process::ExitCode;
use tokio::sync::watch;
use vision_bringup::cli::PlanFormat;
use vision_bringup::{Executor, ExecutorConfig, LaunchArgs, LaunchFile};

fn print_args(launch_file: &LaunchFile) {
    if launch_file.args.is_empty() {
        println!("No arguments.");
        return;
    }

    println!("Arguments (pass arguments as '<name>:=<value>'):");
    for (name, arg) in &launch_file.args {
        println!();
        println!("    '{}':", name);
        println!(
            "        {}",
            arg.description.as_deref().unwrap_or("no description given")
        );
        if let Some(choices) = arg.choice_values() {
            let quoted: Vec<_> = choices.iter().map(|c| format!("'{}'", c)).collect();
            println!("        Valid choices are: [{}]", quoted.join(", "));
        }
        match arg.default_value() {
            Some(default) => println!("        (default: '{}')", default),
            None => println!("        (required)"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: LaunchArgs = argh::from_env();

    // Initialize logging
    let env = env_logger::Env::default().default_filter_or(args.log_filter());
    env_logger::init_from_env(env);

    let (launch_path, arg_overrides) = match (args.launch_file(), args.arg_overrides()) {
        (Ok(path), Ok(overrides)) => (path.map(str::to_string), overrides),
        (Err(e), _) | (_, Err(e)) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // Load launch file
    let launch_file = match &launch_path {
        Some(path) => {
            log::info!("Loading launch file: {}", path);
            LaunchFile::from_file(path)
        }
        None => LaunchFile::vision(),
    };
    let launch_file = match launch_file {
        Ok(lf) => lf,
        Err(e) => {
            log::error!("Failed to load launch file: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.show_args {
        print_args(&launch_file);
        return ExitCode::SUCCESS;
    }

    // Validate only mode
    if args.validate {
        println!(
            "Launch file '{}' is valid",
            launch_path.as_deref().unwrap_or("vision.launch.yaml")
        );
        println!("  Version: {}", launch_file.version);
        println!("  Args: {}", launch_file.args.len());
        println!("  Actions: {}", launch_file.actions.len());
        return ExitCode::SUCCESS;
    }

    let executor_config = ExecutorConfig {
        shutdown_timeout: args.shutdown_timeout(),
        ..Default::default()
    };

    if executor_config.packages.prefixes().is_empty() {
        log::warn!("AMENT_PREFIX_PATH is not set; packages cannot be found");
    }

    // Create executor; invalid argument values fail here
    let mut executor = match Executor::new(launch_file, executor_config, &arg_overrides) {
        Ok(e) => e,
        Err(e) => {
            log::error!("Failed to create executor: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Dry run mode
    if args.dry_run {
        let plan = match executor.plan() {
            Ok(plan) => plan,
            Err(e) => {
                log::error!("Failed to generate launch plan: {}", e);
                return ExitCode::FAILURE;
            }
        };

        match args.format {
            PlanFormat::Json => match serde_json::to_string_pretty(&plan) {
                Ok(json) => println!("{}", json),
                Err(e) => {
                    log::error!("Failed to serialize launch plan: {}", e);
                    return ExitCode::FAILURE;
                }
            },
            PlanFormat::Text => println!("{}", plan),
        }
        return ExitCode::SUCCESS;
    }

    // Create shutdown channel
    let (shutdown_tx, shutdown_rx) = watch::channel(());

    // Set up Ctrl+C handler
    {
        let shutdown_tx = shutdown_tx.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            log::info!("Received Ctrl+C, initiating shutdown...");
            let _ = shutdown_tx.send(());
        }) {
            log::error!("Error setting Ctrl+C handler: {}", e);
            return ExitCode::FAILURE;
        }
    }

    // Launch all active actions
    if let Err(e) = executor.launch(shutdown_rx.clone()).await {
        log::error!("Launch failed: {}", e);
        executor.shutdown().await;
        return ExitCode::FAILURE;
    }

    // Wait for shutdown signal or all processes to exit
    executor.wait(shutdown_rx).await;

    // Shutdown all processes
    executor.shutdown().await;

    log::info!("Vision launcher exiting");
    ExitCode::SUCCESS
}
