use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::time::Duration;

use argh::FromArgs;
use event::{Metric, ServiceCheck};
use exitcode::ExitCode;
use mcache::config::CheckConfig;
use mcache::recorder::{Flushed, Recorder};
use mcache::runner::Runner;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// Rate baselines of series not reported for this many intervals are dropped.
const EXPIRE_INTERVALS: u32 = 3;

#[derive(FromArgs)]
#[argh(
    description = "mcache polls memcached servers and reports their stats",
    help_triggers("-h", "--help")
)]
pub struct RootCommand {
    #[argh(switch, short = 'v', description = "show version")]
    version: bool,

    #[argh(
        option,
        short = 'l',
        default = "\"info\".to_string()",
        description = "log level, overridden by MCACHE_LOG"
    )]
    log_level: String,

    #[argh(switch, description = "emit logs as json")]
    log_json: bool,

    #[argh(
        option,
        short = 'c',
        long = "config",
        description = "check configuration file, yaml or json"
    )]
    config: Option<PathBuf>,

    #[argh(switch, description = "run every instance once, then exit")]
    once: bool,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Submission<'a> {
    Metric(&'a Metric),
    ServiceCheck(&'a ServiceCheck),
}

impl RootCommand {
    #![allow(clippy::print_stdout)]
    fn show_version(&self) {
        println!("{}", mcache::get_version());
    }

    pub fn run(&self) -> Result<(), ExitCode> {
        if self.version {
            self.show_version();
            return Ok(());
        }

        let log_level = std::env::var("MCACHE_LOG").unwrap_or(self.log_level.clone());
        let color = std::io::stderr().is_terminal();
        mcache::trace::init(color, self.log_json, &log_level);

        let Some(path) = &self.config else {
            error!(message = "No configuration file specified, use --config");
            return Err(exitcode::USAGE);
        };

        let config = CheckConfig::load(path).map_err(|err| {
            error!(message = "Load configuration failed", %err);
            exitcode::CONFIG
        })?;
        let runner = Runner::new(&config).map_err(|err| {
            error!(message = "Invalid configuration", ?path, %err);
            exitcode::CONFIG
        })?;
        let interval = config.interval();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("mcache-worker")
            .enable_io()
            .enable_time()
            .build()
            .map_err(|err| {
                error!(message = "Build tokio runtime failed", %err);
                exitcode::OSERR
            })?;

        info!(
            message = "Start mcache",
            instances = runner.checks().len(),
            interval = ?interval,
            once = self.once,
            config = ?path
        );

        let result = runtime.block_on(async move {
            let mut recorder =
                Recorder::new().expire_after(interval.saturating_mul(EXPIRE_INTERVALS));

            if self.once {
                let errors = runner.run_once(&mut recorder).await;
                print(recorder.flush())?;

                if errors.len() == runner.checks().len() {
                    return Err(exitcode::UNAVAILABLE);
                }

                return Ok(());
            }

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let shutdown = tokio::signal::ctrl_c();
            tokio::pin!(shutdown);

            loop {
                tokio::select! {
                    biased;

                    result = &mut shutdown => {
                        if let Err(err) = result {
                            warn!(message = "Listen for ctrl-c failed", %err);
                        }
                        break;
                    },
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    biased;

                    result = &mut shutdown => {
                        if let Err(err) = result {
                            warn!(message = "Listen for ctrl-c failed", %err);
                        }
                        break;
                    },
                    _ = runner.run_once(&mut recorder) => {}
                }

                print(recorder.flush())?;
            }

            info!(message = "Shutdown signal received");

            Ok(())
        });

        runtime.shutdown_timeout(Duration::from_secs(5));

        result
    }
}

fn print(flushed: Flushed) -> Result<(), ExitCode> {
    let Flushed {
        metrics,
        service_checks,
    } = flushed;

    let mut stdout = std::io::stdout().lock();
    let submissions = metrics
        .iter()
        .map(Submission::Metric)
        .chain(service_checks.iter().map(Submission::ServiceCheck));

    for submission in submissions {
        let line = serde_json::to_string(&submission).map_err(|err| {
            error!(message = "Serialize submission failed", %err);
            exitcode::SOFTWARE
        })?;

        writeln!(stdout, "{line}").map_err(|err| {
            error!(message = "Write to stdout failed", %err);
            exitcode::IOERR
        })?;
    }

    stdout.flush().map_err(|err| {
        error!(message = "Flush stdout failed", %err);
        exitcode::IOERR
    })
}
