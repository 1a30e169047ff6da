//! Interactive operator shell.
//!
//! Lines starting with `/` are commands; see [`ReplCommand::parse`] and the
//! `/help` output for the full list.

use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use warden_application::EncounterOrchestrator;
use warden_core::definition::DefinitionSource;
use warden_core::event::EncounterEvent;
use warden_core::world::{ActorHandle, PlayerId};

use crate::sim::{LedgerRewardSink, SimulatedWorld};

const COMMANDS: &[&str] = &[
    "/start",
    "/force",
    "/stop",
    "/reload",
    "/active",
    "/definitions",
    "/history",
    "/join",
    "/leave",
    "/actors",
    "/kill",
    "/hit",
    "/ledger",
    "/help",
    "/quit",
];

#[derive(Debug, Clone, PartialEq)]
pub enum ReplCommand {
    Start { definition: String, scope: String },
    Force { definition: String, scope: String },
    Stop { session: String },
    Reload,
    Active,
    Definitions,
    History { limit: usize, definition: Option<String> },
    Join { scope: String, player: String },
    Leave { scope: String, player: String },
    Actors { scope: Option<String> },
    Kill { actor: u64, player: String },
    Hit { actor: u64, player: String, amount: u64 },
    Ledger,
    Help,
    Quit,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let mut parts = line.split_whitespace();
        let Some(head) = parts.next() else {
            return Err("empty command".to_string());
        };
        let args: Vec<&str> = parts.collect();

        let arg = |i: usize, name: &str| -> Result<String, String> {
            args.get(i)
                .map(|s| s.to_string())
                .ok_or_else(|| format!("{head}: missing <{name}>"))
        };
        let number = |i: usize, name: &str| -> Result<u64, String> {
            let raw = arg(i, name)?;
            raw.trim_start_matches("actor#")
                .parse()
                .map_err(|_| format!("{head}: <{name}> must be a number, got '{raw}'"))
        };

        match head {
            "/start" => Ok(Self::Start {
                definition: arg(0, "definition")?,
                scope: arg(1, "scope")?,
            }),
            "/force" => Ok(Self::Force {
                definition: arg(0, "definition")?,
                scope: arg(1, "scope")?,
            }),
            "/stop" => Ok(Self::Stop {
                session: arg(0, "session")?,
            }),
            "/reload" => Ok(Self::Reload),
            "/active" => Ok(Self::Active),
            "/definitions" => Ok(Self::Definitions),
            "/history" => Ok(Self::History {
                limit: if args.is_empty() {
                    10
                } else {
                    number(0, "limit")? as usize
                },
                definition: args.get(1).map(|s| s.to_string()),
            }),
            "/join" => Ok(Self::Join {
                scope: arg(0, "scope")?,
                player: arg(1, "player")?,
            }),
            "/leave" => Ok(Self::Leave {
                scope: arg(0, "scope")?,
                player: arg(1, "player")?,
            }),
            "/actors" => Ok(Self::Actors {
                scope: args.first().map(|s| s.to_string()),
            }),
            "/kill" => Ok(Self::Kill {
                actor: number(0, "actor")?,
                player: arg(1, "player")?,
            }),
            "/hit" => Ok(Self::Hit {
                actor: number(0, "actor")?,
                player: arg(1, "player")?,
                amount: number(2, "amount")?,
            }),
            "/ledger" => Ok(Self::Ledger),
            "/help" => Ok(Self::Help),
            "/quit" | "/exit" => Ok(Self::Quit),
            other => Err(format!("unknown command '{other}', try /help")),
        }
    }
}

/// Completion, highlighting and hints for slash commands.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: COMMANDS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];
        if !line.starts_with('/') || line.contains(' ') {
            return Ok((0, vec![]));
        }
        let candidates = self
            .commands
            .iter()
            .filter(|cmd| cmd.starts_with(line))
            .map(|cmd| Pair {
                display: cmd.clone(),
                replacement: cmd.clone(),
            })
            .collect();
        Ok((0, candidates))
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];
        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

pub struct Shell {
    pub orchestrator: EncounterOrchestrator,
    pub world: Arc<SimulatedWorld>,
    pub rewards: Arc<LedgerRewardSink>,
    pub source: Arc<dyn DefinitionSource>,
}

/// Prints announcements as they arrive until the channel closes.
pub fn spawn_event_printer(mut events: broadcast::Receiver<EncounterEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => print_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    println!("{}", format!("({n} announcements dropped)").bright_black());
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn print_event(event: &EncounterEvent) {
    let line = event.summary();
    let colored = match event {
        EncounterEvent::Started { .. } => line.bright_red().bold(),
        EncounterEvent::WaveStarted { .. } => line.yellow(),
        EncounterEvent::WaveCleared { .. } => line.green(),
        EncounterEvent::Finished { .. } => line.bright_green().bold(),
    };
    println!("{colored}");
}

impl Shell {
    /// Reads commands until `/quit` or end of input.
    pub async fn run(&self) -> Result<()> {
        let mut rl = Editor::new()?;
        rl.set_helper(Some(CliHelper::new()));

        println!("{}", "=== Warden ===".bright_green().bold());
        println!("{}", "Type /help for commands, /quit to exit.".bright_black());

        loop {
            match rl.readline("warden> ") {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    let _ = rl.add_history_entry(line);
                    match ReplCommand::parse(line) {
                        Ok(ReplCommand::Quit) => break,
                        Ok(command) => self.execute(command).await,
                        Err(message) => println!("{}", message.red()),
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("{}", "^C (use /quit to exit)".bright_black());
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("{}", format!("Error: {err:?}").red());
                    break;
                }
            }
        }
        Ok(())
    }

    async fn execute(&self, command: ReplCommand) {
        match command {
            ReplCommand::Start { definition, scope } => {
                match self.orchestrator.start_session(&definition, &scope).await {
                    Ok(id) => println!("{}", format!("Started session {id}").green()),
                    Err(e) => println!("{}", format!("Refused: {e}").red()),
                }
            }
            ReplCommand::Force { definition, scope } => {
                match self
                    .orchestrator
                    .force_start_session(&definition, &scope)
                    .await
                {
                    Ok(id) => println!("{}", format!("Force-started session {id}").green()),
                    Err(e) => println!("{}", format!("Refused: {e}").red()),
                }
            }
            ReplCommand::Stop { session } => {
                if self.orchestrator.cancel_session(&session).await {
                    println!("{}", format!("Cancelled {session}").yellow());
                } else {
                    println!("{}", format!("No active session '{session}'").red());
                }
            }
            ReplCommand::Reload => match self.orchestrator.load_definitions(self.source.as_ref()).await {
                Ok(report) => {
                    println!(
                        "{}",
                        format!(
                            "Loaded {} definition(s), rejected {}",
                            report.loaded,
                            report.rejected.len()
                        )
                        .green()
                    );
                    for rejected in &report.rejected {
                        println!("  {}", rejected.to_string().yellow());
                    }
                }
                Err(e) => println!("{}", format!("Reload failed, keeping current set: {e}").red()),
            },
            ReplCommand::Active => {
                let sessions = self.orchestrator.get_active_sessions().await;
                if sessions.is_empty() {
                    println!("{}", "No active encounters.".bright_black());
                }
                let mut sessions: Vec<_> = sessions.into_values().collect();
                sessions.sort_by_key(|s| s.started_at);
                for s in sessions {
                    println!(
                        "{} {} '{}' in {} wave {}/{} live {} kills {}",
                        s.session_id.bright_cyan(),
                        s.kind.banner(),
                        s.display_name,
                        s.scope,
                        (s.current_wave_index + 1).min(s.total_waves),
                        s.total_waves,
                        s.live_actors.len(),
                        s.total_kills()
                    );
                }
            }
            ReplCommand::Definitions => {
                for def in self.orchestrator.definitions().await {
                    let state = if def.enabled { "on " } else { "off" };
                    let scopes: Vec<&str> = def.target_scopes.iter().map(String::as_str).collect();
                    println!(
                        "[{state}] {} {} '{}' waves={} scopes={}",
                        def.id.bright_cyan(),
                        def.kind.banner(),
                        def.display_name,
                        def.total_waves(),
                        scopes.join(",")
                    );
                }
            }
            ReplCommand::History { limit, definition } => match self
                .orchestrator
                .query_history(definition.as_deref(), limit)
                .await
            {
                Ok(records) if records.is_empty() => {
                    println!("{}", "No finished encounters yet.".bright_black())
                }
                Ok(records) => records.iter().for_each(|r| println!("{}", r.summary_line())),
                Err(e) => println!("{}", format!("History unavailable: {e}").red()),
            },
            ReplCommand::Join { scope, player } => {
                self.world.join(&scope, PlayerId::new(player.clone()));
                println!("{player} joined {scope}");
            }
            ReplCommand::Leave { scope, player } => {
                if self.world.leave(&scope, &PlayerId::new(player.clone())) {
                    println!("{player} left {scope}");
                } else {
                    println!("{}", format!("{player} is not in {scope}").red());
                }
            }
            ReplCommand::Actors { scope } => {
                let actors = self.world.alive_actors(scope.as_deref());
                if actors.is_empty() {
                    println!("{}", "No live actors.".bright_black());
                }
                for actor in actors {
                    let name = if actor.boss {
                        actor.display_name.bright_red().bold()
                    } else {
                        actor.display_name.normal()
                    };
                    println!("{} {} in {}", actor.handle, name, actor.scope);
                }
            }
            ReplCommand::Kill { actor, player } => {
                let handle = ActorHandle(actor);
                if !self.world.slay(handle) {
                    println!("{}", format!("{handle} is not alive").red());
                    return;
                }
                let credited = self
                    .orchestrator
                    .record_kill(handle, &PlayerId::new(player.clone()))
                    .await;
                let note = if credited { "" } else { " (not part of an encounter)" };
                println!("{player} killed {handle}{note}");
            }
            ReplCommand::Hit {
                actor,
                player,
                amount,
            } => {
                let handle = ActorHandle(actor);
                if !self
                    .orchestrator
                    .record_damage(handle, &PlayerId::new(player), amount)
                    .await
                {
                    println!("{}", format!("{handle} is not part of an encounter").red());
                }
            }
            ReplCommand::Ledger => {
                for (player, ledger) in self.rewards.balances() {
                    println!(
                        "{player}: {} xp, {} coins, items [{}]",
                        ledger.xp,
                        ledger.currency,
                        ledger.items.join(", ")
                    );
                }
            }
            ReplCommand::Help => print_help(),
            ReplCommand::Quit => {}
        }
    }
}

fn print_help() {
    let rows = [
        ("/start <definition> <scope>", "start an encounter"),
        ("/force <definition> <scope>", "start even if disabled"),
        ("/stop <session>", "cancel an active encounter"),
        ("/reload", "reload definitions from disk"),
        ("/active", "list active encounters"),
        ("/definitions", "list loaded definitions"),
        ("/history [limit] [definition]", "recent finished encounters"),
        ("/join <scope> <player>", "put a player into a scope"),
        ("/leave <scope> <player>", "remove a player from a scope"),
        ("/actors [scope]", "list live actors"),
        ("/kill <actor> <player>", "kill an actor, crediting the player"),
        ("/hit <actor> <player> <amount>", "record damage"),
        ("/ledger", "reward balances"),
        ("/quit", "shut down and exit"),
    ];
    for (usage, what) in rows {
        println!("  {:<34} {}", usage.bright_cyan(), what);
    }
}
