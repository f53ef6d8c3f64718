use std::io::Write;

/// Sets up `env_logger`, defaulting `RUST_LOG` to `info` when it isn't set.
pub(crate) fn init_logging() {
    init_logging_with_level("info");
}

pub(crate) fn init_logging_with_level(log_level: &str) {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", log_level);
    }
    env_logger::Builder::from_default_env()
        .format(|fmt, record| {
            let level_style = fmt.default_level_style(record.level());
            writeln!(
                fmt,
                "{} {} {} > {}",
                fmt.timestamp_seconds(),
                level_style.value(record.level()),
                record.target(),
                record.args()
            )
        })
        .init();
}
