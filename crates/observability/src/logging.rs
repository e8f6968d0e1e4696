//! Subscriber initialisation.

use eyre::Result;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::LogArgs;

/// Build the log filter.
///
/// Precedence:
/// 1. If `--quiet` is set, only errors are shown
/// 2. Otherwise `RUST_LOG` if set, else the level implied by `-v`
/// 3. Directives from `--log.filter` are added on top
pub fn build_filter(args: &LogArgs, env: Option<&str>) -> EnvFilter {
    if args.quiet {
        return EnvFilter::new("error");
    }

    let mut filter = env
        .and_then(|env| EnvFilter::try_new(env).ok())
        .unwrap_or_else(|| EnvFilter::new(args.level()));

    if let Some(custom_filter) = &args.filter {
        for directive in custom_filter.split(',').filter(|d| !d.trim().is_empty()) {
            match directive.trim().parse() {
                Ok(d) => filter = filter.add_directive(d),
                Err(err) => eprintln!("ignoring invalid log directive {directive:?}: {err}"),
            }
        }
    }

    filter
}

/// Install the global subscriber.
pub fn init_logging(args: &LogArgs) -> Result<()> {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(args, env.as_deref());

    let stdout_layer = fmt::Layer::new().with_target(true).with_ansi(!args.json);
    let stdout_layer = if args.json {
        stdout_layer.json().boxed()
    } else {
        stdout_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(stdout_layer)
        .with(filter)
        .try_init()?;

    Ok(())
}
