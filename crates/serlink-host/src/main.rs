mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serlink_core::{Dispatcher, HardwareLine, HostLine, LineConfig, SimLine, Transport};
use serlink_governor::{register_cell, GovernorHarness, RegisterCell, SharedEngine};

use config::HostConfig;

const GET_VERSION: u8 = 0xe0;
const MONITOR: u8 = 0x40;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = HostConfig::load()?;
    if config.port_name.is_empty() {
        run_simulated(&config)
    } else {
        run_port(&config)
    }
}

/// Transport, engine and harness wired the way firmware startup does it.
struct Governor<L> {
    dispatcher: Dispatcher<L>,
    harness: GovernorHarness<L>,
    counter: RegisterCell,
    touched: u8,
    trace_wire: bool,
}

impl<L> Governor<L>
where
    L: HardwareLine + Clone + Send + Sync + 'static,
{
    fn start(line: L, config: &HostConfig) -> Result<Self> {
        let engine = SharedEngine::new();
        let (dispatcher, control) = Transport::new(line)
            .on_receive(engine.clone())
            .on_transmit(engine.clone())
            .init();
        let mut harness = GovernorHarness::new(engine, control, config.firmware.clone());

        let counter = register_cell(0);
        harness
            .setup_reg(config.touched_register, counter.clone())
            .with_context(|| format!("binding counter to register {}", config.touched_register))?;

        Ok(Self {
            dispatcher,
            harness,
            counter,
            touched: config.touched_register,
            trace_wire: config.trace_wire,
        })
    }

    /// Plays the interrupt controller: dispatch while a condition is pending.
    fn service_interrupts(&mut self) {
        let mut rx = Vec::new();
        let mut tx = Vec::new();
        while self.dispatcher.interrupt_pending() {
            let outcome = self.dispatcher.dispatch();
            rx.extend(outcome.received);
            tx.extend(outcome.transmitted);
        }
        if self.trace_wire {
            if !rx.is_empty() {
                log::info!("rx {}", hex::encode(&rx));
            }
            if !tx.is_empty() {
                log::info!("tx {}", hex::encode(&tx));
            }
        }
    }

    /// One pass of the firmware main loop after the delay.
    fn tick(&mut self) -> Result<()> {
        self.harness.version_process();
        self.service_interrupts();
        self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.harness.register_touched(self.touched)?;
        self.service_interrupts();
        Ok(())
    }
}

fn run_port(config: &HostConfig) -> Result<()> {
    let line = match HostLine::open(&config.port_name, &LineConfig::GOVERNOR) {
        Ok(line) => Arc::new(line),
        Err(e) => {
            let ports = HostLine::available_ports();
            return Err(e).with_context(|| format!("available ports: [{}]", ports.join(", ")));
        }
    };
    let mut governor = Governor::start(line.clone(), config)?;
    let tick = Duration::from_millis(config.tick_ms);

    loop {
        loop {
            let waiting = line.poll_wire()?;
            governor.service_interrupts();
            if waiting == 0 {
                break;
            }
        }
        governor.tick()?;
        std::thread::sleep(tick);
    }
}

fn run_simulated(config: &HostConfig) -> Result<()> {
    log::info!("no port configured, running {} ticks on a simulated line", config.sim_ticks);
    let line = Arc::new(SimLine::new());
    let mut governor = Governor::start(line.clone(), config)?;

    let script = [GET_VERSION, MONITOR | (config.touched_register & 0x1f)];
    for &byte in &script {
        line.inject(byte);
        governor.service_interrupts();
    }
    for _ in 0..config.sim_ticks {
        governor.tick()?;
    }

    let wire = line.take_written();
    log::info!("{} bytes sent: {}", wire.len(), hex::encode(&wire));
    let stats = governor.harness.stats();
    log::info!(
        "versions sent: {}, output triggers: {}, register changes: {}, setup faults: {}",
        stats.versions_sent,
        stats.output_triggers,
        stats.register_changes,
        stats.setup_faults
    );
    Ok(())
}
