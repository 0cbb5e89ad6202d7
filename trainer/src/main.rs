use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::EnvFilter;

use chess::PieceColor;
use trainer::config;
use trainer::progress::ProgressLedger;
use trainer::puzzle::{build_roadmap, load_puzzles, Feedback, PuzzleRecord, PuzzleSession};
use trainer::session::{spawn_session, EngineSet, SessionEvent};

/// Pacing delay before a scripted opponent move lands.
const PUZZLE_OPPONENT_DELAY: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let data_dir = config::get_data_dir();
    tracing::info!("Data directory: {:?}", data_dir);

    // The session actor takes ownership of its ledger; puzzle
    // settlement goes through a second handle over the same store.
    let ledger = ProgressLedger::new(&data_dir);
    let puzzle_ledger = ProgressLedger::new(&data_dir);
    let profile = ledger.load_profile();
    println!(
        "Welcome back, {} (streak: {} days, XP: {})",
        profile.username,
        profile.streak,
        ledger.xp_total()
    );

    let puzzles = load_puzzles(&config::get_puzzles_path());
    if !puzzles.is_empty() {
        println!(
            "{} puzzles across {} stages",
            puzzles.len(),
            build_roadmap(&puzzles).len()
        );
    }

    let engines = EngineSet::spawn().await;
    if engines.any_offline() {
        println!("Engine unavailable: no opponent, analysis, or hints this session.");
    }
    let session = spawn_session(engines, ledger, PieceColor::White, 5);
    let (_, mut events) = session.subscribe().await.expect("session just spawned");
    session.set_enabled(true).await.expect("session just spawned");

    println!(
        "Commands: move <uci>, hint, undo, resign, new, color <w|b>, level <1-20>, \
         puzzles, puzzle <n>, quit"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(SessionEvent::StateChanged(snap)) => {
                        if let Some(last) = snap.history.last() {
                            println!("{:>3}. {} [{}]", snap.history.len(), last.san, snap.evaluation);
                        }
                        if let Some(quality) = snap.quality {
                            println!("     move quality: {}", quality.label());
                        }
                        if let Some(hint) = &snap.hint {
                            println!("     hint: {} -> {}", hint.from, hint.to);
                        }
                        if let Some(result) = snap.result {
                            println!("Game over: {:?}", result);
                        }
                    }
                    Ok(SessionEvent::Evaluation(update)) => {
                        tracing::debug!("eval {} @ {}", update.value, update.position_key);
                    }
                    Ok(SessionEvent::Error(e)) => eprintln!("error: {}", e),
                    // Events pile up while a puzzle holds the prompt.
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
            line = lines.next_line() => {
                let Ok(Some(line)) = line else { break };
                let line = line.trim();
                if let Some(arg) = line.strip_prefix("puzzle ") {
                    match arg.trim().parse::<usize>() {
                        Ok(n) if (1..=puzzles.len()).contains(&n) => {
                            run_puzzle(&mut lines, &puzzle_ledger, &puzzles[n - 1]).await;
                        }
                        _ => eprintln!("usage: puzzle <1-{}>", puzzles.len()),
                    }
                } else if line == "puzzles" {
                    list_puzzles(&puzzles, &puzzle_ledger);
                } else if !dispatch(&session, line).await {
                    break;
                }
            }
        }
    }

    session.shutdown().await;
}

async fn dispatch(session: &trainer::session::SessionHandle, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    let result = match (parts.next(), parts.next()) {
        (Some("move"), Some(mv)) => session.user_move(mv).await,
        (Some("hint"), _) => session.toggle_hint().await,
        (Some("undo"), _) => session.undo().await,
        (Some("resign"), _) => session.resign().await,
        (Some("new"), _) => session.new_game().await,
        (Some("color"), Some(c)) => {
            let color = if c.starts_with('b') {
                PieceColor::Black
            } else {
                PieceColor::White
            };
            session.set_player_color(color).await
        }
        (Some("level"), Some(n)) => match n.parse() {
            Ok(level) => session.set_difficulty(level).await,
            Err(_) => {
                eprintln!("usage: level <1-20>");
                return true;
            }
        },
        (Some("quit"), _) => return false,
        (None, _) => return true,
        _ => {
            eprintln!("unknown command: {}", line);
            return true;
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
    }
    true
}

fn list_puzzles(puzzles: &[PuzzleRecord], ledger: &ProgressLedger) {
    if puzzles.is_empty() {
        println!("no puzzles loaded");
        return;
    }
    for stage in build_roadmap(puzzles) {
        println!(
            "level {} {:14} puzzles {}-{}",
            stage.level,
            stage.mate_type,
            stage.start_index + 1,
            stage.start_index + stage.count
        );
    }
    for (i, record) in puzzles.iter().enumerate() {
        let stars = ledger
            .result_for(&record.id)
            .map(|r| format!("{:.1} stars", r.stars))
            .unwrap_or_else(|| "unsolved".to_string());
        println!("{:>3}. {} ({})", i + 1, record.id, stars);
    }
}

/// Drive one scripted puzzle to completion and settle it. The opponent
/// owns the even move indices and plays them after a pacing delay; a
/// user move that matches the script pre-empts the timer.
async fn run_puzzle(
    lines: &mut Lines<BufReader<Stdin>>,
    ledger: &ProgressLedger,
    record: &PuzzleRecord,
) {
    let mut session = match PuzzleSession::new(record) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("puzzle {} unplayable: {}", record.id, e);
            return;
        }
    };
    println!(
        "Puzzle {} ({}, level {}): {}",
        record.id,
        record.mate_type,
        record.level,
        session.game().to_fen()
    );
    println!("Puzzle commands: move <uci>, hint, auto, back");

    while !session.is_complete() {
        if session.is_opponent_turn() {
            tokio::select! {
                _ = tokio::time::sleep(PUZZLE_OPPONENT_DELAY) => {
                    if let Some(mv) = session.play_scripted() {
                        println!("opponent plays {}", mv);
                    }
                }
                line = lines.next_line() => {
                    let Ok(Some(line)) = line else { return };
                    if !puzzle_dispatch(&mut session, line.trim()) {
                        return;
                    }
                }
            }
        } else {
            let Ok(Some(line)) = lines.next_line().await else {
                return;
            };
            if !puzzle_dispatch(&mut session, line.trim()) {
                return;
            }
        }
    }

    if let Some(outcome) = session.take_outcome() {
        let settlement = ledger.settle_puzzle(session.id(), outcome.stars);
        println!(
            "Solved with {:.1} stars ({} hints used): +{} XP, {} total",
            outcome.stars, outcome.hints_used, settlement.xp_awarded, settlement.xp_total
        );
    }
}

fn puzzle_dispatch(session: &mut PuzzleSession, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("move"), Some(mv)) => match session.try_user_move(mv) {
            Feedback::Correct => println!("correct"),
            Feedback::Wrong => println!("wrong move, board unchanged"),
        },
        (Some("hint"), _) => match session.hint() {
            Some((from, to)) => println!("hint: {} -> {}", from, to),
            None => println!("no hint available"),
        },
        (Some("auto"), _) => match session.auto_move() {
            Some(mv) => println!("auto-played {}", mv),
            None => println!("nothing to auto-play"),
        },
        (Some("back"), _) => return false,
        (None, _) => {}
        _ => eprintln!("unknown puzzle command: {}", line),
    }
    true
}
