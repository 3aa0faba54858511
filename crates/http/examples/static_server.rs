use std::sync::Arc;
use std::time::Duration;

use micro_httpd::config::ServerConfig;
use micro_httpd::handler::MemoryUserStore;
use micro_httpd::server::Reactor;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = ServerConfig::builder()
        .address("127.0.0.1:1316")
        .trigger_mode(3)
        .idle_timeout(Duration::from_secs(60))
        .worker_threads(6)
        .document_root("./resources")
        .build()
        .expect("valid server config");

    let users = MemoryUserStore::with_users([("admin", "admin")]);

    let mut reactor = match Reactor::new(config, Arc::new(users)) {
        Ok(reactor) => reactor,
        Err(e) => {
            error!(cause = %e, "bind server error");
            return;
        }
    };

    if let Err(e) = reactor.run() {
        error!(cause = %e, "server stopped");
    }
}
