use env_logger::Builder;
use log::LevelFilter;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn initialize_logger() {
    INIT.call_once(|| {
        let mut builder = Builder::new();

        builder
            .filter_level(LevelFilter::Info)
            .filter_module("pyrite", LevelFilter::Debug)
            .filter_module("pyrite::buffer", LevelFilter::Debug)
            .filter_module("pyrite::storage", LevelFilter::Debug)
            .filter_module("pyrite::container", LevelFilter::Debug)
            .format_timestamp_millis()
            .parse_default_env()
            .init();
    });
}
