use simplelog::{ConfigBuilder, LevelFilter, SimpleLogger};

/// Verbose runs also show resolver prompts and completions.
fn level(verbose: bool) -> LevelFilter {
    if verbose { LevelFilter::Debug } else { LevelFilter::Warn }
}

pub fn init(verbose: bool) {
    let config = ConfigBuilder::new()
        .add_filter_allow_str("intent_bridge")
        .build();
    let _ = SimpleLogger::init(level(verbose), config);
}
