use fairdraw_core::{AuditInput, NullSink, StageLogger, analyze, run_nist};
use serde_json::json;

pub fn run(path: &str, nist: bool) {
    let bits = super::read_bits(path);
    let report = analyze(&AuditInput::Bits(bits.to_string())).unwrap_or_else(|e| super::fail(e));
    let mut result = json!(report);
    if nist {
        log::info!("running NIST SP 800-22 over {} bits", bits.len());
        result["nist"] = json!(run_nist(&bits, &StageLogger::new(&NullSink)));
    }
    super::print_json(&result);
}
