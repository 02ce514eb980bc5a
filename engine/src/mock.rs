//! Deterministic in-process UCI engine for tests.
//!
//! `ScriptedEngine` answers the handshake, records every command it reads, and
//! replies to `go` with canned `info` lines followed by a `bestmove`. It can
//! hold its `bestmove` behind a [`BestMoveGate`] or ignore `go` entirely to
//! model a hung engine.

use crate::transport::{EmbeddedEngine, EngineIo};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, Once, PoisonError};
use std::time::Duration;

static INIT: Once = Once::new();
static INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

/// How many times the scripted engine's one-time init has run in this process.
pub fn global_init_count() -> usize {
    INIT_COUNT.load(Ordering::SeqCst)
}

/// Shared record of every command a scripted engine read.
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<String>>>);

impl CommandLog {
    fn push(&self, line: &str) {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }

    pub fn commands(&self) -> Vec<String> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of commands starting with `prefix`.
    pub fn count(&self, prefix: &str) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.commands().iter().any(|c| c == line)
    }
}

/// Holds back `bestmove` until opened.
#[derive(Debug, Clone, Default)]
pub struct BestMoveGate(Arc<(Mutex<bool>, Condvar)>);

impl BestMoveGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self) {
        let (open, cvar) = &*self.0;
        *open.lock().unwrap_or_else(PoisonError::into_inner) = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (open, cvar) = &*self.0;
        let guard = open.lock().unwrap_or_else(PoisonError::into_inner);
        // Bounded so a forgotten gate cannot wedge a test run
        let _ = cvar
            .wait_timeout_while(guard, Duration::from_secs(10), |open| !*open)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    name: String,
    bestmove: String,
    bestmove_by_fen: HashMap<String, String>,
    search_info: Vec<String>,
    info_by_fen: HashMap<String, Vec<String>>,
    answer_go: bool,
    gate: Option<BestMoveGate>,
    log: CommandLog,
}

impl Default for ScriptedEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self {
            name: "scripted".to_string(),
            bestmove: "e2e4".to_string(),
            bestmove_by_fen: HashMap::new(),
            search_info: Vec::new(),
            info_by_fen: HashMap::new(),
            answer_go: true,
            gate: None,
            log: CommandLog::default(),
        }
    }

    /// Move returned for any position without its own script.
    pub fn with_bestmove(mut self, mv: &str) -> Self {
        self.bestmove = mv.to_string();
        self
    }

    pub fn with_bestmove_for(mut self, fen: &str, mv: &str) -> Self {
        self.bestmove_by_fen.insert(fen.to_string(), mv.to_string());
        self
    }

    /// `info` lines emitted after every `go` for positions without their own
    /// script.
    pub fn with_search_info(mut self, lines: Vec<String>) -> Self {
        self.search_info = lines;
        self
    }

    pub fn with_info_for(mut self, fen: &str, lines: Vec<String>) -> Self {
        self.info_by_fen.insert(fen.to_string(), lines);
        self
    }

    pub fn with_gate(mut self, gate: BestMoveGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Ignore `go` and `stop` completely.
    pub fn never_answer_go(mut self) -> Self {
        self.answer_go = false;
        self
    }

    pub fn command_log(&self) -> CommandLog {
        self.log.clone()
    }

    fn bestmove_for(&self, fen: &str) -> &str {
        self.bestmove_by_fen
            .get(fen)
            .map(String::as_str)
            .unwrap_or(&self.bestmove)
    }

    fn info_for(&self, fen: &str) -> &[String] {
        self.info_by_fen
            .get(fen)
            .map(Vec::as_slice)
            .unwrap_or(&self.search_info)
    }
}

impl EmbeddedEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn init_guard(&self) -> &'static Once {
        &INIT
    }

    fn global_init(&self) {
        INIT_COUNT.fetch_add(1, Ordering::SeqCst);
    }

    fn run(&self, io: EngineIo) {
        let EngineIo { input, mut output } = io;
        let mut fen = String::new();
        let mut searching = false;

        for command in input {
            self.log.push(&command);
            let mut tokens = command.split_whitespace();

            match tokens.next() {
                Some("uci") => {
                    output.send_line(&format!("id name {}", self.name));
                    output.send_line("uciok");
                }
                Some("isready") => output.send_line("readyok"),
                Some("position") => {
                    if let Some(rest) = command.strip_prefix("position fen ") {
                        fen = rest.trim().to_string();
                    }
                }
                Some("go") if self.answer_go => {
                    for line in self.info_for(&fen) {
                        output.send_line(line);
                    }
                    if tokens.any(|t| t == "infinite") {
                        searching = true;
                        continue;
                    }
                    if let Some(gate) = &self.gate {
                        gate.wait();
                    }
                    output.send_line(&format!("bestmove {}", self.bestmove_for(&fen)));
                }
                Some("stop") if self.answer_go && searching => {
                    searching = false;
                    output.send_line(&format!("bestmove {}", self.bestmove_for(&fen)));
                }
                Some("quit") => break,
                _ => {}
            }
        }
    }
}
