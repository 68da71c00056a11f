pub mod audit;
pub mod draw;
pub mod serve;
pub mod verify;

use fairdraw_core::BitStream;

/// Print `msg` to stderr and exit with status 1.
pub fn fail(msg: impl std::fmt::Display) -> ! {
    eprintln!("error: {msg}");
    std::process::exit(1);
}

/// Read a file of bits, ignoring everything that is not `'0'` or `'1'`.
pub fn read_bits(path: &str) -> BitStream {
    let text = std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_else(|e| fail(format!("cannot read {path}: {e}")));
    let bits = BitStream::from_text_lenient(&text);
    if bits.is_empty() {
        fail(format!("{path} contains no 0/1 bits"));
    }
    bits
}

pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => fail(e),
    }
}
