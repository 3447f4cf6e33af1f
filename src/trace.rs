use tracing_subscriber::EnvFilter;
use tracing_subscriber::util::SubscriberInitExt;

/// Install the global subscriber, logs go to stderr so stdout only carries
/// submissions.
///
/// `levels` takes the `EnvFilter` directive syntax, e.g. `mcache=debug,warn`.
/// Calling it twice is harmless, the first subscriber wins.
pub fn init(color: bool, json: bool, levels: &str) {
    let filter = EnvFilter::try_new(levels).unwrap_or_else(|err| {
        eprintln!("invalid log level {levels:?}, fallback to \"info\": {err}");
        EnvFilter::new("info")
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(color);

    let result = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder.finish().try_init()
    };

    if let Err(err) = result {
        debug!(message = "Global subscriber already installed", %err);
    }
}
