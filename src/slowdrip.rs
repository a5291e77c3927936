use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing::error;

use slowdrip::{Args, Driver, Summary, Target, TcpDialer, TestConfig, TracingReporter};

fn run(args: &Args) -> Result<Summary> {
    let config = TestConfig::from_args(args)?;
    let target = Target::parse(&args.url)?;
    let addr = target.resolve()?;
    let driver = Driver::new(config, target, TcpDialer::new(addr), TracingReporter)?;
    Ok(driver.run()?)
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match format!("slowdrip={}", args.log_level).parse::<tracing_subscriber::filter::Directive>() {
        Ok(directive) => tracing_subscriber::EnvFilter::from_default_env().add_directive(directive),
        Err(err) => {
            eprintln!("ERROR: invalid log level {level:?}: {err}", level = args.log_level);
            return ExitCode::FAILURE;
        }
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(&args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
