//! Play a full game against simulated dice.
//!
//! ```text
//! simulate [--seed N] [--config game.json] [NAME ...]
//! ```
//!
//! Each simulated die reports a random stable face. The strategy keeps the
//! most common face, rerolls the rest while rerolls remain, then locks the
//! best-scoring open category.

use std::error::Error;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing_subscriber::{fmt, EnvFilter};

use yahtzee_dice_state::config::GameConfig;
use yahtzee_dice_state::runtime::{self, GameHandle};
use yahtzee_dice_state::{
    DiceController, DiceRegistry, DieEvent, DieId, Game, GameStatus, GameView, NextTurn, SlotView,
};

const DICE_ADDRESSES: [&str; 5] = [
    "SIM:00:01", "SIM:00:02", "SIM:00:03", "SIM:00:04", "SIM:00:05",
];

struct Args {
    seed: Option<u64>,
    config: Option<String>,
    names: Vec<String>,
}

fn parse_args() -> Result<Args, Box<dyn Error>> {
    let mut args = Args {
        seed: None,
        config: None,
        names: Vec::new(),
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--seed" => {
                let value = iter.next().ok_or("--seed needs a value")?;
                args.seed = Some(value.parse()?);
            }
            "--config" => {
                args.config = Some(iter.next().ok_or("--config needs a path")?);
            }
            _ => args.names.push(arg),
        }
    }
    Ok(args)
}

fn connected_dice() -> DiceRegistry {
    let mut dice = DiceRegistry::new();
    for address in DICE_ADDRESSES {
        let (id, _) = dice.discover(address);
        dice.observe(&DieEvent::Connected(id));
    }
    dice
}

fn roll(handle: &GameHandle, rng: &mut StdRng, dice: &[DieId]) -> Result<(), Box<dyn Error>> {
    for &die in dice {
        handle.send_event(DieEvent::Rolling(die))?;
        handle.send_event(DieEvent::Stable {
            die,
            face: rng.random_range(1..=6),
        })?;
    }
    Ok(())
}

/// Face to keep: the most common one, higher face on ties.
fn keeper_face(view: &GameView) -> Option<u8> {
    let mut counts = [0usize; 7];
    for face in view.slots.iter().filter_map(|s| s.face) {
        counts[face as usize] += 1;
    }
    (1..=6u8)
        .filter(|&f| counts[f as usize] > 0)
        .max_by_key(|&f| (counts[f as usize], f))
}

async fn play_turn(
    handle: &GameHandle,
    rng: &mut StdRng,
    max_rerolls: u8,
) -> Result<NextTurn, Box<dyn Error>> {
    let view = handle.fetch_view().await?;
    let required: Vec<DieId> = view.slots.iter().filter_map(|s| s.die).collect();
    roll(handle, rng, &required)?;

    for _ in 0..max_rerolls {
        let view = handle.fetch_view().await?;
        let Some(keep) = keeper_face(&view) else {
            break;
        };
        let (keepers, reroll): (Vec<&SlotView>, Vec<&SlotView>) = view
            .slots
            .iter()
            .filter(|slot| slot.die.is_some())
            .partition(|slot| slot.face == Some(keep));
        if reroll.is_empty() {
            break;
        }
        for slot in keepers {
            if let Some(die) = slot.die {
                handle.toggle_hold(die).await?;
            }
        }
        let reroll: Vec<DieId> = reroll.iter().filter_map(|slot| slot.die).collect();
        roll(handle, rng, &reroll)?;
    }

    let view = handle.fetch_view().await?;
    let best = view
        .scorecard
        .iter()
        .filter(|row| !row.locked)
        .max_by_key(|row| row.score.unwrap_or(0))
        .map(|row| row.category)
        .ok_or("no open category left")?;

    let outcome = handle.lock_category(best).await?;
    tracing::info!(
        player = %view.current_player,
        category = %outcome.category,
        score = outcome.score,
        "turn played"
    );
    Ok(outcome.next)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let args = parse_args()?;
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    // Simulated dice settle instantly.
    config.reroll_cooldown_ms = 0;
    let max_rerolls = config.max_rerolls;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let game = Game::new(connected_dice(), args.names.as_slice(), config)?;
    let (handle, task) = runtime::spawn(game);

    let result = loop {
        match play_turn(&handle, &mut rng, max_rerolls).await? {
            NextTurn::Player(_) => continue,
            NextTurn::GameComplete(result) => break result,
        }
    };

    handle.shutdown()?;
    let game = task.await?;
    debug_assert_eq!(game.status(), GameStatus::Finished);

    println!("Final scores:");
    for (name, total) in result.names.iter().zip(&result.totals) {
        println!("  {name:<12} {total:>4}");
    }
    let winners = result.winner_names().join(", ");
    if result.is_tie() {
        println!("Tie between {winners}");
    } else {
        println!("Winner: {winners}");
    }
    Ok(())
}
