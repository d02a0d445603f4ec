// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-iogateway project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::{ConfigStore, ModbusRole};
use crate::io::{Hardware, IoController};
use crate::modbus::{
    serve_rtu, serve_tcp, RoleAdapter, RoleBinding, ServerEndpoint, TCP_IDLE_TIMEOUT,
};
use crate::platform::{HostPlatform, Platform};
use crate::registers::RegisterBank;
use crate::sync::{RegisterSync, RemoteGateway};

/// Period of the maintenance loop
const MAINTENANCE_PERIOD: Duration = Duration::from_secs(1);

/// Period of the heartbeat log and of the client probe
const HEARTBEAT_PERIOD: Duration = Duration::from_secs(60);

/// Time given to each task to stop
const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

type SharedStore = Arc<Mutex<Box<dyn ConfigStore>>>;

/// Composition root of the gateway
///
/// Owns the channel controller, the configuration store, the active Modbus
/// role and the background tasks:
///
/// - the tick task polls the channels and runs a synchronisation pass;
/// - the server task answers Modbus peers in the server roles;
/// - the maintenance task supervises the watchdog, saves the channel
///   statistics and logs a heartbeat.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    server: Option<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    platform: Arc<HostPlatform>,
    io: Option<Arc<Mutex<IoController>>>,
    state_file: Option<PathBuf>,
    bank: Option<Arc<RegisterBank>>,
    local_addr: Option<SocketAddr>,
    role: ModbusRole,
}

impl Daemon {
    /// Create a new daemon instance
    pub fn new(platform: Arc<HostPlatform>) -> Self {
        Daemon {
            tasks: Vec::new(),
            server: None,
            running: Arc::new(AtomicBool::new(true)),
            platform,
            io: None,
            state_file: None,
            bank: None,
            local_addr: None,
            role: ModbusRole::None,
        }
    }

    /// Build the component graph and start every task
    pub async fn launch(
        &mut self,
        store: Box<dyn ConfigStore>,
        hardware: Box<dyn Hardware>,
    ) -> Result<()> {
        let config = store.config().clone();

        let poll_ms = u32::try_from(config.io.poll_interval_ms.max(1))
            .context("Poll interval does not fit 32 bits")?;
        let mut controller = IoController::new(config.platform.board, hardware, poll_ms);
        let state_file = PathBuf::from(&config.io.state_file);
        match controller.load_state(&state_file) {
            Ok(report) => {
                if report.channels > 0 {
                    info!("Restored statistics of {} channels", report.channels);
                }
                for mismatch in &report.mismatches {
                    warn!("Statistics discarded: {}", mismatch);
                }
            }
            Err(e) => warn!("Ignoring saved IO statistics: {:#}", e),
        }
        let io = Arc::new(Mutex::new(controller));
        let store: SharedStore = Arc::new(Mutex::new(store));

        let platform: Arc<dyn Platform> = self.platform.clone();
        let binding = RoleBinding::setup(&config, platform).await;
        self.role = binding.role();

        let mut remote = None;
        let sync_adapter: Option<Arc<dyn RoleAdapter>> = match binding {
            RoleBinding::Server { adapter, endpoint } => {
                self.start_server(adapter.bank().clone(), endpoint)?;
                self.bank = Some(adapter.bank().clone());
                Some(adapter)
            }
            RoleBinding::Client(adapter) => {
                remote = Some(RemoteGateway::new(adapter));
                None
            }
            RoleBinding::Disabled => None,
        };

        self.start_tick(
            io.clone(),
            store,
            sync_adapter,
            Duration::from_millis(config.io.poll_interval_ms.max(1)),
        );
        self.start_maintenance(
            io.clone(),
            state_file.clone(),
            Duration::from_secs(config.io.persist_interval_s.max(1)),
            remote,
        );

        self.io = Some(io);
        self.state_file = Some(state_file);
        Ok(())
    }

    /// Start the Modbus server task
    fn start_server(&mut self, bank: Arc<RegisterBank>, endpoint: ServerEndpoint) -> Result<()> {
        let task = match endpoint {
            ServerEndpoint::Tcp(listener) => {
                self.local_addr = Some(listener.local_addr()?);
                tokio::spawn(async move {
                    serve_tcp(listener, bank, TCP_IDLE_TIMEOUT)
                        .await
                        .context("Modbus TCP server failed")
                })
            }
            ServerEndpoint::Rtu { serial, unit_id } => tokio::spawn(async move {
                serve_rtu(serial, unit_id, bank)
                    .await
                    .context("Modbus RTU server failed")
            }),
        };
        self.server = Some(task);
        Ok(())
    }

    /// Start the tick task: channel poll, then a synchronisation pass in the
    /// server roles
    fn start_tick(
        &mut self,
        io: Arc<Mutex<IoController>>,
        store: SharedStore,
        adapter: Option<Arc<dyn RoleAdapter>>,
        period: Duration,
    ) {
        info!("Starting tick task every {:?}", period);

        let running = self.running.clone();
        let platform = self.platform.clone();
        let task = tokio::spawn(async move {
            let mut sync = RegisterSync::default();
            let mut interval = time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while running.load(Ordering::SeqCst) {
                interval.tick().await;
                let now = platform.uptime().millis();

                let mut io = io.lock().await;
                let polled = io.poll(now);
                if polled.transitions > 0 || polled.faults > 0 {
                    debug!(
                        "Poll at {} ms: {} transitions, {} faults",
                        now, polled.transitions, polled.faults
                    );
                }

                if let Some(adapter) = &adapter {
                    let mut store = store.lock().await;
                    let pass = sync
                        .tick(adapter.as_ref(), &mut *io, &mut **store, platform.as_ref(), now)
                        .await;
                    if pass.errors > 0 {
                        warn!("Synchronisation pass finished with {} errors", pass.errors);
                    }
                }
                drop(io);

                platform.ping_watchdog();
                tokio::task::yield_now().await;
            }
            debug!("Tick task stopped");
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Start the maintenance task
    fn start_maintenance(
        &mut self,
        io: Arc<Mutex<IoController>>,
        state_file: PathBuf,
        persist_every: Duration,
        mut remote: Option<RemoteGateway>,
    ) {
        debug!("Starting maintenance task");

        let running = self.running.clone();
        let platform = self.platform.clone();
        let task = tokio::spawn(async move {
            let mut next_persist = Instant::now() + persist_every;
            let mut next_heartbeat = Instant::now();

            while running.load(Ordering::SeqCst) {
                time::sleep(MAINTENANCE_PERIOD).await;
                if platform.check_watchdog() {
                    break;
                }

                let now = Instant::now();
                if now >= next_persist {
                    next_persist = now + persist_every;
                    let io = io.lock().await;
                    if let Err(e) = io.save_state(&state_file) {
                        error!("Failed to save IO statistics: {:#}", e);
                    }
                }

                if now >= next_heartbeat {
                    next_heartbeat = now + HEARTBEAT_PERIOD;
                    info!(
                        "Daemon heartbeat: uptime {} ms, frozen: {}",
                        platform.uptime().millis(),
                        platform.is_frozen()
                    );
                    if let Some(remote) = remote.as_mut() {
                        match remote.firmware().await {
                            Ok((version, _)) => debug!("Modbus peer runs firmware {}", version),
                            Err(e) => {
                                warn!("Modbus peer probe failed: {}", e);
                                remote.forget();
                            }
                        }
                    }
                }

                tokio::task::yield_now().await;
            }
            debug!("Maintenance task stopped");
            Ok(())
        });

        self.tasks.push(task);
    }

    /// Active Modbus role, `none` when the setup failed
    pub fn role(&self) -> ModbusRole {
        self.role
    }

    /// Register bank of the server roles
    pub fn bank(&self) -> Option<&Arc<RegisterBank>> {
        self.bank.as_ref()
    }

    /// Address of the Modbus TCP server
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Channel controller, shared with the tick task
    pub fn io(&self) -> Option<&Arc<Mutex<IoController>>> {
        self.io.as_ref()
    }

    pub fn reboot_requested(&self) -> bool {
        self.platform.is_reboot_requested()
    }

    /// Write the channel statistics to the state file
    pub async fn save_io_state(&self) -> Result<()> {
        if let (Some(io), Some(path)) = (&self.io, &self.state_file) {
            io.lock().await.save_state(path)?;
            debug!("IO statistics saved to {:?}", path);
        }
        Ok(())
    }

    /// Stop all running tasks
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // The server loop never returns on its own
        if let Some(server) = &self.server {
            server.abort();
        }
    }

    /// Wait for all tasks to complete
    pub async fn join(self) -> Result<()> {
        let tasks = self.tasks.into_iter().chain(self.server);
        for task in tasks {
            match time::timeout(JOIN_TIMEOUT, task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => error!("Task failed: {:#}", e),
                Ok(Err(e)) if e.is_cancelled() => debug!("Task aborted"),
                Ok(Err(e)) => error!("Task panicked: {}", e),
                Err(_) => warn!("Task did not stop within {:?}", JOIN_TIMEOUT),
            }
        }
        Ok(())
    }
}
