use fairdraw_core::default_registry;
use fairdraw_server::{ServerConfig, run_server};

pub fn run(host: Option<String>, port: Option<u16>) {
    let mut config = ServerConfig::from_env().unwrap_or_else(|e| super::fail(e));
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }
    let sources = default_registry();
    let base = format!("http://{}", config.bind_addr());

    println!("fairdraw server v{}", fairdraw_core::VERSION);
    println!("   {base}");
    println!("   sources: {}", sources.names().join(", "));
    println!();
    println!("   Endpoints:");
    println!("     POST /draw/start              Start a draw job");
    println!("     GET  /draw/result/{{id}}        Draw status and result");
    println!("     GET  /draw/stream/{{id}}        Stage events (SSE)");
    println!("     GET  /draw/events/{{id}}        Stage events from ?cursor=N");
    println!("     GET  /draw/bits/{{id}}          Whitened bits of a completed draw");
    println!("     POST /draw/{{id}}/nist/start    NIST battery over a draw's bits");
    println!("     POST /audit/analyze           Quick battery over bits or numbers");
    println!("     POST /audit/upload            Quick battery over a raw text body");
    println!("     POST /audit/nist/start        NIST battery job");
    println!("     GET  /health                  Health check");
    println!();
    println!("   Example:");
    println!("     curl -X POST {base}/draw/start -H 'content-type: application/json' -d '{{\"bits\":4096}}'");
    println!();

    let rt = tokio::runtime::Runtime::new().unwrap_or_else(|e| super::fail(e));
    if let Err(e) = rt.block_on(run_server(config, sources)) {
        super::fail(e);
    }
}
