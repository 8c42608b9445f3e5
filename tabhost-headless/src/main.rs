mod scenario;

use std::sync::Arc;

use tabhost_core::memory::{memory_services, MemoryHistory, MemoryHost};
use tabhost_core::{Shell, ShellConfig};
use tokio::sync::mpsc;

use crate::scenario::{Runner, Scenario};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::init();

    let scenario = match std::env::args().nth(1) {
        Some(path) => match Scenario::load(&path) {
            Ok(s) => s,
            Err(e) => {
                log::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => Scenario::demo(),
    };

    let config = scenario.config.clone().unwrap_or_else(ShellConfig::load);
    let (tx, rx) = mpsc::unbounded_channel();
    let host = Arc::new(MemoryHost::new().with_events(tx));
    let history = Arc::new(MemoryHistory::new());
    let shell = Shell::new(memory_services(&host, &history), config);

    let mut runner = Runner::new(shell, host, history, rx);
    if let Err(e) = runner.run(&scenario).await {
        log::error!("Scenario aborted: {}", e);
        std::process::exit(1);
    }
}
