//! The simulation actor: the single owner of the game engine.
//!
//! Connections, the console and the timers all talk to it through
//! [`SimCommand`]s on one channel, so every engine call runs on this task and
//! nothing else touches game state. Disk writes run on the blocking pool and
//! report back through their own channel.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lineage_game::{Audience, GameEngine, ServerEvent};
use lineage_world::storage::WorldStorage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

use crate::console::{ConsoleCommand, HELP};
use crate::gateway::{ClientMessage, Outbox};
use crate::sessions::{self, SessionManager};

pub enum SimCommand {
    Connect { id: String, outbox: Outbox },
    Client { id: String, message: ClientMessage },
    Disconnect { id: String },
    Console { line: String, reply: oneshot::Sender<String> },
}

#[derive(Debug, Clone, Copy)]
pub struct Cadence {
    pub slow: Duration,
    pub fast: Duration,
}

struct Connection {
    outbox: Outbox,
    session: Option<String>,
    spawned: bool,
}

pub struct Simulation {
    engine: GameEngine,
    storage: WorldStorage,
    sessions: SessionManager,
    connections: HashMap<String, Connection>,
    rng: StdRng,
    stop_requested: bool,
}

impl Simulation {
    pub fn new(engine: GameEngine, storage: WorldStorage, grace: Duration) -> Self {
        Self {
            engine,
            storage,
            sessions: SessionManager::new(grace),
            connections: HashMap::new(),
            rng: StdRng::from_entropy(),
            stop_requested: false,
        }
    }

    /// Run until shutdown is signalled, the console asks to stop, or every
    /// command sender is gone. Flushes the pending save before returning.
    pub async fn run(
        mut self,
        cadence: Cadence,
        mut commands: mpsc::Receiver<SimCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut slow = tokio::time::interval(cadence.slow);
        let mut fast = tokio::time::interval(cadence.fast);
        let (save_tx, mut save_rx) = mpsc::channel::<bool>(4);

        loop {
            tokio::select! {
                _ = slow.tick() => {
                    self.slow_tick(Instant::now());
                    self.start_due_save(&save_tx);
                }
                _ = fast.tick() => {
                    self.fast_tick();
                }
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle(command),
                        None => break,
                    }
                    if self.stop_requested {
                        break;
                    }
                }
                Some(ok) = save_rx.recv() => {
                    self.engine.map_mut().finish_save(ok, Instant::now());
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        drop(save_tx);
        self.wait_for_save(&mut save_rx).await;
        self.flush_save();
    }

    // ─── Ticks ──────────────────────────────────────────────────────────────

    fn slow_tick(&mut self, now: Instant) {
        self.engine.update();
        for player_id in self.sessions.expire(now) {
            if self.engine.players().contains(&player_id) {
                self.engine.remove_player(&player_id, true);
                info!(player = %player_id, "reconnect grace expired");
            }
        }
        self.flush_events();
    }

    fn fast_tick(&mut self) {
        self.engine.update_fast();
        self.flush_events();
    }

    // ─── Persistence ────────────────────────────────────────────────────────

    fn start_due_save(&mut self, done: &mpsc::Sender<bool>) {
        let Some(save) = self.engine.map_mut().take_due_save(Instant::now()) else {
            return;
        };
        let storage = self.storage.clone();
        let done = done.clone();
        tokio::spawn(async move {
            let ok = match tokio::task::spawn_blocking(move || storage.save(&save)).await {
                Ok(Ok(())) => true,
                Ok(Err(e)) => {
                    error!("world save failed: {e}");
                    false
                }
                Err(e) => {
                    error!("world save task failed: {e}");
                    false
                }
            };
            let _ = done.send(ok).await;
        });
    }

    /// Let an in-flight background save land so changes made after its
    /// snapshot are still pending for [`Simulation::flush_save`].
    async fn wait_for_save(&mut self, done: &mut mpsc::Receiver<bool>) {
        while self.engine.map().autosave().is_saving() {
            match done.recv().await {
                Some(ok) => self.engine.map_mut().finish_save(ok, Instant::now()),
                None => {
                    warn!("background save never reported back");
                    self.engine.map_mut().finish_save(false, Instant::now());
                }
            }
        }
    }

    /// Write the pending save synchronously. Shutdown path only.
    fn flush_save(&mut self) {
        let Some(save) = self.engine.map_mut().flush_auto_save() else {
            debug!("nothing to save on shutdown");
            return;
        };
        info!("Saving world before shutdown...");
        let ok = match self.storage.save(&save) {
            Ok(()) => true,
            Err(e) => {
                error!("world save failed: {e}");
                false
            }
        };
        self.engine.map_mut().finish_save(ok, Instant::now());
    }

    // ─── Routing ────────────────────────────────────────────────────────────

    fn deliver(&self, audience: &Audience, event: &ServerEvent) {
        let line: Arc<str> = match serde_json::to_string(event) {
            Ok(line) => line.into(),
            Err(e) => {
                warn!(kind = event.kind(), "failed to serialize event: {e}");
                return;
            }
        };
        for (id, connection) in &self.connections {
            if audience.includes(id) {
                let _ = connection.outbox.send(line.clone());
            }
        }
    }

    fn flush_events(&mut self) {
        for outgoing in self.engine.drain_events() {
            self.deliver(&outgoing.audience, &outgoing.event);
        }
    }

    pub fn handle(&mut self, command: SimCommand) {
        match command {
            SimCommand::Connect { id, outbox } => {
                self.connections.insert(
                    id,
                    Connection {
                        outbox,
                        session: None,
                        spawned: false,
                    },
                );
            }
            SimCommand::Client { id, message } => self.handle_client(&id, message),
            SimCommand::Disconnect { id } => self.disconnect(&id, Instant::now()),
            SimCommand::Console { line, reply } => {
                let response = match ConsoleCommand::parse(&line) {
                    Ok(command) => self.run_console(command),
                    Err(e) => e.to_string(),
                };
                let _ = reply.send(response);
            }
        }
        self.flush_events();
    }

    // ─── Clients ────────────────────────────────────────────────────────────

    fn handle_client(&mut self, id: &str, message: ClientMessage) {
        let Some(connection) = self.connections.get(id) else {
            return;
        };
        let spawned = connection.spawned;
        match message {
            ClientMessage::RequestBirth if !spawned => self.birth(id),
            ClientMessage::RequestReconnect { session_token } if !spawned => self.reconnect(id, session_token),
            ClientMessage::RequestBirth | ClientMessage::RequestReconnect { .. } => {}
            _ if !spawned => debug!(%id, "command before birth ignored"),
            ClientMessage::Move { dx, dy } => {
                self.engine.move_player(id, dx, dy);
            }
            ClientMessage::Eat => {
                self.engine.eat(id);
            }
            ClientMessage::PickUp => {
                self.engine.pick_up(id);
            }
            ClientMessage::Drop => {
                self.engine.drop(id);
            }
            ClientMessage::DropBackpack => {
                self.engine.drop_backpack(id);
            }
            ClientMessage::AddToBackpack => {
                self.engine.add_held_to_backpack(id);
            }
            ClientMessage::TakeFromBackpack => {
                self.engine.take_held_from_backpack(id);
            }
            ClientMessage::Use => {
                self.engine.use_held(id);
            }
            ClientMessage::Shoot { angle } => {
                self.engine.handle_shoot(id, angle);
            }
            ClientMessage::Chat(text) => {
                self.engine.chat(id, &text);
            }
            ClientMessage::NameBaby { baby_id, name } => {
                self.engine.name_baby(id, &baby_id, &name);
            }
        }
    }

    fn birth(&mut self, id: &str) {
        let token = sessions::new_token(&mut self.rng);
        if !self.engine.request_birth(id, Some(token.clone())) {
            warn!(%id, "birth failed");
            return;
        }
        if let Some(connection) = self.connections.get_mut(id) {
            connection.session = Some(token);
            connection.spawned = true;
        }
    }

    fn reconnect(&mut self, id: &str, token: Option<String>) {
        let Some(token) = token else {
            self.birth(id);
            return;
        };
        let Some(old_id) = self.sessions.claim(&token) else {
            info!(%id, "no reconnection found for token, spawning new character");
            self.birth(id);
            return;
        };
        if !self.engine.players().contains(&old_id) || !self.engine.update_player_id(&old_id, id) {
            warn!(old = %old_id, new = %id, "reconnection failed, spawning new character");
            self.birth(id);
            return;
        }
        if let Some(connection) = self.connections.get_mut(id) {
            connection.session = Some(token.clone());
            connection.spawned = true;
        }

        let init = self.engine.init_payload(id, Some(token), true);
        self.deliver(&Audience::Player(id.to_string()), &ServerEvent::Init(Box::new(init)));
        self.deliver(&Audience::All, &ServerEvent::PlayerDisconnected(old_id.clone()));
        if let Some(view) = self.engine.player(id) {
            self.deliver(&Audience::AllExcept(id.to_string()), &ServerEvent::NewPlayer(view));
        }
        info!(old = %old_id, new = %id, "player reconnected");
    }

    fn disconnect(&mut self, id: &str, now: Instant) {
        let Some(connection) = self.connections.remove(id) else {
            return;
        };
        let alive = self.engine.player(id).is_some_and(|p| !p.is_dead);
        match connection.session {
            Some(token) if alive => {
                self.sessions.start_grace(token, id, now);
                info!(player = %id, "disconnected, grace period started");
            }
            _ => {
                self.engine.remove_player(id, true);
            }
        }
    }

    // ─── Console ────────────────────────────────────────────────────────────

    fn run_console(&mut self, command: ConsoleCommand) -> String {
        match command {
            ConsoleCommand::Help => HELP.to_string(),
            ConsoleCommand::Stats => self.stats_report(),
            ConsoleCommand::Players => self.players_report(),
            ConsoleCommand::Save => {
                self.engine.map_mut().request_save_now();
                "World save requested".to_string()
            }
            ConsoleCommand::Reset(seed) => {
                let seed = seed.unwrap_or_else(|| self.rng.gen());
                self.engine.reinitialize_world(seed);
                format!("World reinitialized with seed {seed}")
            }
            ConsoleCommand::Module { name, enabled } => {
                if self.engine.set_module_state(&name, enabled) {
                    format!("{name} {}", if enabled { "enabled" } else { "disabled" })
                } else {
                    let known: Vec<&str> = self.engine.module_states().into_keys().collect();
                    format!("Unknown module {name}. Modules: {}", known.join(", "))
                }
            }
            ConsoleCommand::Stop => {
                self.stop_requested = true;
                "Stopping server...".to_string()
            }
        }
    }

    fn stats_report(&mut self) -> String {
        let s = self.engine.statistics();
        let mut out = String::new();
        let _ = writeln!(out, "Uptime: {}", self.engine.uptime());
        let _ = writeln!(out, "Year {}, {}", s.current_year, s.current_season.name());
        let _ = writeln!(
            out,
            "Population: {} (peak {}, ever {}), babies {}, adults {}, elders {}, male {}, female {}",
            s.current_population,
            s.peak_population,
            s.total_players_ever,
            s.babies_alive,
            s.adults_alive,
            s.elders_alive,
            s.male_count,
            s.female_count
        );
        let _ = writeln!(out, "Births: {}, deaths: {}", s.total_births, s.total_deaths);
        for (cause, count) in &s.deaths_by_cause {
            let _ = writeln!(out, "  {cause}: {count}");
        }
        let _ = writeln!(
            out,
            "World {}x{}: {} objects, {} animals",
            s.world_size, s.world_size, s.total_objects, s.total_animals
        );
        let _ = writeln!(
            out,
            "Generation: {}, longest lineage: {}",
            s.current_generation, s.longest_lineage
        );
        let _ = write!(out, "Tick rate: {}/s, last tick {} us", s.tick_rate, s.last_tick_micros);
        out
    }

    fn players_report(&self) -> String {
        let ids = self.engine.players().player_ids();
        if ids.is_empty() {
            return "No players online".to_string();
        }
        let mut out = format!("{} player(s):", ids.len());
        for id in ids {
            if let Some(p) = self.engine.player(&id) {
                let _ = write!(
                    out,
                    "\n  {} [{}] age {}, hunger {}/{}, generation {}",
                    p.name, p.id, p.age, p.hunger, p.max_hunger, p.generation
                );
            }
        }
        if self.sessions.waiting() > 0 {
            let _ = write!(out, "\n{} awaiting reconnection", self.sessions.waiting());
        }
        out
    }

    #[cfg(test)]
    fn engine(&self) -> &GameEngine {
        &self.engine
    }
}
