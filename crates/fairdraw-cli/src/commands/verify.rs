use fairdraw_core::{derive, sample, verify};

pub fn run(bits_file: &str, fingerprint: &str, draw: Option<(usize, u64)>) {
    let bits = super::read_bits(bits_file);
    if !verify(&bits, fingerprint) {
        println!("MISMATCH  {} bits hash to {}", bits.len(), derive(&bits).fingerprint);
        std::process::exit(1);
    }
    println!("OK  fingerprint matches {} bits", bits.len());
    if let Some((numbers, max_number)) = draw {
        let combo = sample(&derive(&bits).seed, numbers, max_number).unwrap_or_else(|e| super::fail(e));
        let combo: Vec<String> = combo.iter().map(u64::to_string).collect();
        println!("draw: {}", combo.join(" "));
    }
}
