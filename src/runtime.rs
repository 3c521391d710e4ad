//! Async driver for a [`Game`].
//!
//! The game lives on a single task. Die events, hold toggles and lock
//! requests arrive over one command queue and are applied in order, so no
//! two handlers ever observe a half-updated turn. Two timers run on the same
//! task: the owed-roll LED flash and the missing-slot blink.
//!
//! ```text
//!   SDK callbacks ──┐
//!                   ├──▶ mpsc<Command> ──▶ ┌───────────┐ ──▶ watch<GameView>
//!   UI actions ─────┘                      │ game task │ ──▶ broadcast<RollAnnouncement>
//!                        led flash tick ──▶│           │
//!                        slot blink tick ─▶└───────────┘
//! ```

use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::state::dice::{DiceController, DieEvent, DieId};
use crate::state::game::{Game, GameView, LockOutcome, LockRejection};
use crate::state::scoring::Category;
use crate::state::turn::{HoldChange, RollAnnouncement, TurnRejection};

const ANNOUNCEMENT_CAPACITY: usize = 16;

/// Work for the game task.
#[derive(Debug)]
pub enum Command {
    Die(DieEvent),
    ToggleHold {
        die: DieId,
        reply: oneshot::Sender<Result<HoldChange, TurnRejection>>,
    },
    LockCategory {
        category: Category,
        reply: oneshot::Sender<Result<LockOutcome, LockRejection>>,
    },
    /// Reply with a view once every earlier command has been applied
    View {
        reply: oneshot::Sender<GameView>,
    },
    Shutdown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    #[error("Game task has stopped")]
    Closed,
    #[error(transparent)]
    Hold(#[from] TurnRejection),
    #[error(transparent)]
    Lock(#[from] LockRejection),
}

/// Cloneable handle to a running game task.
#[derive(Debug, Clone)]
pub struct GameHandle {
    commands: mpsc::UnboundedSender<Command>,
    views: watch::Receiver<GameView>,
    announcements: broadcast::Sender<RollAnnouncement>,
}

impl GameHandle {
    /// Queue a die event. Never blocks, so SDK callbacks can call it.
    pub fn send_event(&self, event: DieEvent) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Die(event))
            .map_err(|_| RuntimeError::Closed)
    }

    pub async fn toggle_hold(&self, die: DieId) -> Result<HoldChange, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::ToggleHold { die, reply })
            .map_err(|_| RuntimeError::Closed)?;
        rx.await
            .map_err(|_| RuntimeError::Closed)?
            .map_err(RuntimeError::from)
    }

    pub async fn lock_category(&self, category: Category) -> Result<LockOutcome, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::LockCategory { category, reply })
            .map_err(|_| RuntimeError::Closed)?;
        rx.await
            .map_err(|_| RuntimeError::Closed)?
            .map_err(RuntimeError::from)
    }

    /// Ask the task to tear down. The join handle yields the final game.
    pub fn shutdown(&self) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Shutdown)
            .map_err(|_| RuntimeError::Closed)
    }

    /// View after every command queued so far has been applied.
    pub async fn fetch_view(&self) -> Result<GameView, RuntimeError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::View { reply })
            .map_err(|_| RuntimeError::Closed)?;
        rx.await.map_err(|_| RuntimeError::Closed)
    }

    /// Latest published view.
    pub fn view(&self) -> GameView {
        self.views.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<GameView> {
        self.views.clone()
    }

    pub fn subscribe_announcements(&self) -> broadcast::Receiver<RollAnnouncement> {
        self.announcements.subscribe()
    }
}

/// Run `game` on a new task.
///
/// The task stops on [`GameHandle::shutdown`] or once every handle is
/// dropped; either way the dice LEDs are switched off before it returns.
pub fn spawn<C>(game: Game<C>) -> (GameHandle, JoinHandle<Game<C>>)
where
    C: DiceController + Send + 'static,
{
    let (commands, rx) = mpsc::unbounded_channel();
    let (views_tx, views) = watch::channel(game.view(true));
    let (announcements, _) = broadcast::channel(ANNOUNCEMENT_CAPACITY);

    let task = tokio::spawn(run(game, rx, views_tx, announcements.clone()));
    let handle = GameHandle {
        commands,
        views,
        announcements,
    };
    (handle, task)
}

async fn run<C: DiceController>(
    mut game: Game<C>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    views: watch::Sender<GameView>,
    announcements: broadcast::Sender<RollAnnouncement>,
) -> Game<C> {
    let mut led_flash = time::interval(game.config().led_flash_interval());
    led_flash.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut slot_blink = time::interval(game.config().missing_blink_interval());
    slot_blink.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut blink_on = true;

    tracing::info!("game task started");
    loop {
        tokio::select! {
            command = commands.recv() => match command {
                None | Some(Command::Shutdown) => break,
                Some(Command::Die(event)) => {
                    game.handle_event(event);
                }
                Some(Command::ToggleHold { die, reply }) => {
                    let _ = reply.send(game.toggle_hold(die));
                }
                Some(Command::LockCategory { category, reply }) => {
                    let _ = reply.send(game.attempt_lock_category(category));
                }
                Some(Command::View { reply }) => {
                    let _ = reply.send(game.view(blink_on));
                    continue;
                }
            },
            _ = led_flash.tick() => {
                let flashed = game.flash_owed_dice();
                if flashed > 0 {
                    tracing::trace!(flashed, "flashed dice owed a roll");
                }
            }
            _ = slot_blink.tick() => {
                blink_on = !blink_on;
            }
        }
        publish(&mut game, &views, &announcements, blink_on);
    }

    game.shutdown();
    publish(&mut game, &views, &announcements, false);
    tracing::info!(status = game.status().as_str(), "game task stopped");
    game
}

fn publish<C: DiceController>(
    game: &mut Game<C>,
    views: &watch::Sender<GameView>,
    announcements: &broadcast::Sender<RollAnnouncement>,
    blink_on: bool,
) {
    if let Some(announcement) = game.take_announcement() {
        tracing::debug!(%announcement, "roll announced");
        // No subscribers is fine.
        let _ = announcements.send(announcement);
    }
    views.send_replace(game.view(blink_on));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::state::dice::DiceRegistry;
    use crate::state::game::{GameStatus, NextTurn};
    use crate::state::turn::TurnPhase;
    use pretty_assertions::assert_eq;

    fn quiet_config() -> GameConfig {
        GameConfig {
            reroll_cooldown_ms: 0,
            led_flash_interval_ms: 60_000,
            missing_blink_interval_ms: 60_000,
            ..GameConfig::default()
        }
    }

    fn spawn_game(names: &[&str]) -> (GameHandle, JoinHandle<Game<DiceRegistry>>) {
        let mut dice = DiceRegistry::new();
        for i in 0..5 {
            let (id, _) = dice.discover(&format!("RT:{i:02}"));
            dice.observe(&DieEvent::Connected(id));
        }
        spawn(Game::new(dice, names, quiet_config()).unwrap())
    }

    fn roll(handle: &GameHandle, faces: [u8; 5]) {
        for (i, face) in faces.into_iter().enumerate() {
            handle
                .send_event(DieEvent::Stable {
                    die: DieId(i as u32),
                    face,
                })
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_commands_apply_in_order() {
        let (handle, task) = spawn_game(&["Alice", "Bob"]);
        let mut announcements = handle.subscribe_announcements();

        roll(&handle, [1, 1, 1, 4, 5]);
        let outcome = handle.lock_category(Category::ThreeOfAKind).await.unwrap();
        assert_eq!(outcome.score, 12);
        assert_eq!(outcome.next, NextTurn::Player(1));

        let announcement = announcements.recv().await.unwrap();
        assert_eq!(announcement.faces, vec![1, 1, 1, 4, 5]);

        let view = handle.view();
        assert_eq!(view.current_player, "Bob");
        assert_eq!(view.phase, TurnPhase::InitialRoll { rolled: 0 });

        handle.shutdown().unwrap();
        let game = task.await.unwrap();
        assert_eq!(game.status(), GameStatus::Abandoned);
        assert_eq!(game.players()[0].score(Category::ThreeOfAKind), Some(12));
    }

    #[tokio::test]
    async fn test_rejections_come_back() {
        let (handle, task) = spawn_game(&["Alice"]);

        assert_eq!(
            handle.lock_category(Category::Chance).await,
            Err(RuntimeError::Lock(LockRejection::Turn(
                TurnRejection::FinishInitialRoll
            )))
        );
        assert_eq!(
            handle.toggle_hold(DieId(0)).await,
            Err(RuntimeError::Hold(TurnRejection::FinishInitialRoll))
        );

        roll(&handle, [2, 3, 4, 5, 6]);
        assert_eq!(
            handle.toggle_hold(DieId(0)).await,
            Ok(HoldChange::Held(DieId(0)))
        );

        handle.shutdown().unwrap();
        let game = task.await.unwrap();
        assert!(!game.dice().led_on(DieId(0)));
    }

    #[tokio::test]
    async fn test_fetch_view_sees_queued_events() {
        let (handle, task) = spawn_game(&["Alice"]);

        roll(&handle, [6, 6, 6, 1, 2]);
        let view = handle.fetch_view().await.unwrap();
        assert!(view.can_score);
        let faces: Vec<Option<u8>> = view.slots.iter().map(|s| s.face).collect();
        assert_eq!(faces, vec![Some(6), Some(6), Some(6), Some(1), Some(2)]);

        handle.shutdown().unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_after_shutdown() {
        let (handle, task) = spawn_game(&["Alice"]);
        handle.shutdown().unwrap();
        task.await.unwrap();

        assert_eq!(
            handle.send_event(DieEvent::Rolling(DieId(0))),
            Err(RuntimeError::Closed)
        );
        assert_eq!(
            handle.toggle_hold(DieId(0)).await,
            Err(RuntimeError::Closed)
        );
        assert_eq!(handle.view().status, GameStatus::Abandoned);
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_task() {
        let (handle, task) = spawn_game(&["Alice"]);
        drop(handle);
        let game = task.await.unwrap();
        assert_eq!(game.status(), GameStatus::Abandoned);
    }
}
