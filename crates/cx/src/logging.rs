use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber when `CX_LOG` or `RUST_LOG` is set.
/// `CX_LOG` wins when both are.
pub(crate) fn init() {
    let filter = match std::env::var("CX_LOG") {
        Ok(directives) => EnvFilter::builder().parse_lossy(directives),
        Err(_) if std::env::var_os("RUST_LOG").is_some() => EnvFilter::from_default_env(),
        Err(_) => return,
    };

    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}
