use clap::Parser;
use mongo_migrate::{
    ConfigError, ConfigOverrides, FileConfig, MigrateConfig, Migrator, MongoConnector,
    TracingReporter,
};
use std::ffi::OsStr;
use std::path::Path;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(version = env!("CARGO_PKG_VERSION"), author = env!("CARGO_PKG_AUTHORS"))]
struct Opts {
    /// configuration file path, command line options override its values.
    #[clap(short, long)]
    config: Option<String>,
    /// source database uri.
    #[clap(long)]
    source_uri: Option<String>,
    /// destination database uri, its collections are replaced.
    #[clap(long)]
    dest_uri: Option<String>,
    /// comma separated databases never copied, default is admin,config,local,test.
    #[clap(long, value_delimiter = ',')]
    exclude: Option<Vec<String>>,
    /// deadline for the whole run, like 500ms, 10s, 5m, 1h.  Default is 10s.
    #[clap(long)]
    timeout: Option<String>,
    /// stream collections and insert every N documents instead of loading them whole.
    #[clap(long)]
    chunk_size: Option<usize>,
    /// log file path, if not specified, all log information will be output to stdout.
    #[clap(long)]
    log_path: Option<String>,
}

fn main() -> ExitCode {
    let opts: Opts = Opts::parse();
    // keep the guard until main returns, or buffered log lines are lost.
    let _guard = init_tracing(opts.log_path.as_deref());

    let conf = match load_config(opts) {
        Ok(conf) => conf,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let exclude: Vec<&str> = conf.get_exclusions().iter().collect();
    info!(
        ?exclude,
        timeout = ?conf.get_timeout(),
        mode = ?conf.get_transfer_mode(),
        "Begin to migrate databases."
    );

    let result = Migrator::new(conf).run(&MongoConnector::new(), &TracingReporter);
    if result.is_completed() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn load_config(opts: Opts) -> Result<MigrateConfig, ConfigError> {
    let file = opts.config.map(|path| FileConfig::from_path(path)).transpose()?;
    MigrateConfig::resolve(
        file,
        ConfigOverrides {
            source_uri: opts.source_uri,
            dest_uri: opts.dest_uri,
            exclude: opts.exclude,
            timeout: opts.timeout,
            chunk_size: opts.chunk_size,
        },
    )
}

fn init_tracing(log_path: Option<&str>) -> WorkerGuard {
    let (non_blocking, guard) = match log_path.map(Path::new) {
        Some(path) => {
            let dir_name = path
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .unwrap_or_else(|| OsStr::new("mongo_migrate.log"));
            let file_appender = tracing_appender::rolling::daily(dir_name, file_name);
            tracing_appender::non_blocking(file_appender)
        }
        None => tracing_appender::non_blocking(std::io::stdout()),
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(log_path.is_none())
        .with_writer(non_blocking)
        .init();
    guard
}
