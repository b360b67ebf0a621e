// This code is licensed under Elastic License 2.0
// https://www.elastic.co/licensing/elastic-license

use log::{error, info};
use tokio::signal;

/// Wait for Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = signal::ctrl_c().await {
      error!("Could not install Ctrl-C handler: {}", e);
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
      Ok(mut stream) => {
        stream.recv().await;
      }
      Err(e) => {
        error!("Could not install SIGTERM handler: {}", e);
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => info!("Received Ctrl-C, starting graceful shutdown"),
    _ = terminate => info!("Received SIGTERM, starting graceful shutdown"),
  }
}
