mod args;

use {
    crate::args::{Cli, Command, UsageError},
    clap::Parser,
    color_eyre::Report,
    eyre::{eyre, WrapErr},
    retarget::{
        run_all, run_shard, ChainFkSolver, Config, CoordinatorOptions,
        LaunchMode, RetargetJob, Retargeter, RonAssetStore, WorkerShard,
    },
    std::io::IsTerminal,
    tracing_subscriber::{fmt, prelude::*, EnvFilter},
};

fn main() -> Result<(), Report> {
    install_tracing()?;
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::load_default()?;

    let code = match run(cli.command, &config) {
        Ok(()) => 0,
        Err(err) => match err.downcast_ref::<UsageError>() {
            Some(usage) => {
                tracing::error!("{}", usage);
                usage.code()
            }
            None => return Err(err),
        },
    };

    if code != 0 {
        std::process::exit(code);
    }
    Ok(())
}

fn install_tracing() -> Result<(), Report> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(std::io::stdout().is_terminal()))
        .with(tracing_error::ErrorLayer::default())
        .init();
    Ok(())
}

fn run(command: Command, config: &Config) -> Result<(), Report> {
    match command {
        Command::All(args) => {
            let params = args.validate(config.workers)?;
            let mode = if params.in_process {
                LaunchMode::InProcess
            } else {
                let program = std::env::current_exe()
                    .wrap_err("Failed to locate own executable")?;
                LaunchMode::Processes { program }
            };

            let report = run_all(
                config,
                &CoordinatorOptions {
                    base_dir: params.base_dir,
                    seed: params.seed,
                    workers: params.workers,
                    mode,
                },
            )?;

            for outcome in report.failed_shards() {
                tracing::error!(
                    "Worker {} for `{}` failed: {:?}",
                    outcome.shard.index,
                    outcome.subset,
                    outcome.status
                );
            }
            if params.in_process {
                tracing::info!("Total: {}", report.totals());
            }
            Ok(())
        }
        Command::Worker(args) => {
            let params = args.validate()?;
            tracing::info!(
                "Worker {} of {} for `{}` with seed {}",
                params.index,
                params.count,
                params.subset,
                params.seed
            );

            let shard =
                WorkerShard::with_seed(params.index, params.count, params.seed);
            let report =
                run_shard(config, &params.base_dir, params.subset, shard);
            if report.succeeded == 0 && report.failed > 0 {
                return Err(eyre!("Every attempted pair failed: {}", report));
            }
            Ok(())
        }
        Command::Pair(args) => {
            let params = args.validate()?;
            let job = RetargetJob::new(params.input, params.target, params.output);

            let mut retargeter = Retargeter::new(
                RonAssetStore::new(&config.content_dir),
                ChainFkSolver,
                config.pipeline(params.persist, true),
            );
            retargeter.run(&job).wrap_err("Retargeting failed")?;
            Ok(())
        }
    }
}
