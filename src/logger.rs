use std::env;

use simplelog::{ConfigBuilder, SharedLogger};

use crate::prelude::*;

pub const LOG_LEVEL_ENV: &str = "STREAMEXEC_LOG";

fn log_level() -> log::LevelFilter {
    env::var(LOG_LEVEL_ENV)
        .ok()
        .and_then(|log_level| log_level.parse::<log::LevelFilter>().ok())
        .unwrap_or(log::LevelFilter::Info)
}

/// Terminal logger writing to stderr, stdout belongs to the child's output.
pub fn get_logger() -> Box<dyn SharedLogger> {
    let config = ConfigBuilder::new()
        .set_time_level(log::LevelFilter::Debug)
        .build();

    simplelog::TermLogger::new(
        log_level(),
        config,
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    )
}

pub fn init_logger() -> Result<()> {
    simplelog::CombinedLogger::init(vec![get_logger()])?;
    Ok(())
}
