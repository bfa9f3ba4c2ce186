// src/exporter.rs
use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the Prometheus recorder with its own HTTP listener on `listen`
/// (`host:port`), serving the exposition format on any path.
pub fn install_prometheus(listen: &str) -> anyhow::Result<SocketAddr> {
    let addr: SocketAddr = listen
        .parse()
        .with_context(|| format!("invalid metrics listen address {listen:?}"))?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("prometheus: install recorder")?;

    describe_all();
    Ok(addr)
}

/// Register descriptions for every series so they show up before first use.
pub fn describe_all() {
    crate::collect::ensure_metrics_described();
    crate::engine::ensure_metrics_described();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_listen_address() {
        let err = install_prometheus("not-an-address").unwrap_err();
        assert!(err.to_string().contains("invalid metrics listen address"));
    }
}
