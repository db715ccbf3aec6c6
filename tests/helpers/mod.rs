#![allow(dead_code)]

pub mod handshaker;
pub mod mock_server;
pub mod tls;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wraith=debug")
        .with_test_writer()
        .try_init();
}
