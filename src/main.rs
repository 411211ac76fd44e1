use std::io;
use std::process::ExitCode;

use color_eyre::Result;

use slurmscope::app::{App, Outcome};
use slurmscope::args::Args;
use slurmscope::slurm::Scontrol;
use slurmscope::validate::ValidationError;

fn setup_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    setup_logging();

    let args: Args = argh::from_env();
    if args.version {
        println!("slurmscope v{}", env!("CARGO_PKG_VERSION"));
        return Ok(ExitCode::SUCCESS);
    }

    let Some(command) = args.command else {
        eprintln!("No command given; run with --help for usage");
        return Ok(ExitCode::FAILURE);
    };

    let app = App::new(Scontrol::new(args.scontrol));
    match app.run(&command, &mut io::stdout().lock(), &mut io::stderr().lock()) {
        Ok(Outcome::Success) => Ok(ExitCode::SUCCESS),
        Ok(Outcome::NotFound) => Ok(ExitCode::FAILURE),
        // Caller mistakes are reported plainly, without a backtrace
        Err(report) => match report.downcast_ref::<ValidationError>() {
            Some(error) => {
                eprintln!("Error: {}", error);
                Ok(ExitCode::from(2))
            }
            None => Err(report),
        },
    }
}
