/// Initialize the logger with the specified verbosity level
///
/// # Arguments
/// * `verbose` - Verbosity level (0=warn, 1=info, 2=debug, 3+=trace)
pub fn setup_logger(verbose: u8) {
    let env_filter = filter_for(verbose);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(env_filter))
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();
}

/// Installs a test-friendly logger; safe to call from every test.
pub fn init_test_logger() {
    let env = env_logger::Env::default().default_filter_or("condlock=debug");
    let _ = env_logger::Builder::from_env(env).is_test(true).try_init();
}

fn filter_for(verbose: u8) -> &'static str {
    match verbose {
        0 => "condlock=warn",
        1 => "condlock=info",
        2 => "condlock=debug",
        _ => "condlock=trace",
    }
}
