use fairdraw_core::{DrawConfig, MemorySink, StageLogger, default_registry, run_draw};
use serde_json::json;

pub struct DrawCommandConfig<'a> {
    pub sources: &'a str,
    pub bits: usize,
    pub numbers: usize,
    pub max_number: u64,
    pub bits_out: Option<&'a str>,
    pub include_stages: bool,
}

pub fn run(cfg: DrawCommandConfig<'_>) {
    let config = DrawConfig {
        sources: cfg
            .sources
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        bits: cfg.bits,
        numbers: cfg.numbers,
        max_number: cfg.max_number,
    };
    let sink = MemorySink::new();
    let outcome = run_draw(&config, &default_registry(), &StageLogger::new(&sink))
        .unwrap_or_else(|e| super::fail(e));

    if let Some(path) = cfg.bits_out {
        if let Err(e) = std::fs::write(path, outcome.bits.to_string()) {
            super::fail(format!("cannot write {path}: {e}"));
        }
        log::info!("wrote {} bits to {path}", outcome.bits.len());
    }

    let mut result = json!({
        "config": config,
        "draw": outcome.draw,
        "fingerprint": outcome.fingerprint,
        "algorithm": outcome.algorithm,
        "tests": outcome.tests,
    });
    if cfg.include_stages {
        result["stages"] = json!(sink.events());
    }
    super::print_json(&result);
}
