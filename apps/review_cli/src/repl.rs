use std::io::Write;

use review_core::{
    DeferredEffect, IgnoredReason, ReviewError, ReviewResult, SessionController, SessionPhase,
    Transition,
};
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, Lines},
    time::{sleep_until, Instant},
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Answer(String),
    Undo,
    More,
    Retry,
    Logout,
    Quit,
    Empty,
}

pub fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    match trimmed {
        "" => Command::Empty,
        ":undo" | ":u" => Command::Undo,
        ":more" | ":m" => Command::More,
        ":retry" | ":r" => Command::Retry,
        ":logout" => Command::Logout,
        ":quit" | ":q" => Command::Quit,
        _ => Command::Answer(trimmed.to_string()),
    }
}

/// Drives `session` from `input` until the user quits, signs out or input ends.
pub async fn run<R, W>(session: &mut SessionController, input: R, out: &mut W) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    render(session, out)?;

    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            Command::Quit => break,
            Command::Empty => {}
            Command::Undo => print_undo(session.undo(), out)?,
            Command::More => print_outcome(session.learn_more().await, out)?,
            Command::Retry => print_outcome(session.resume().await, out)?,
            Command::Logout => {
                session.logout().await;
            }
            Command::Answer(text) => match session.submit_answer(&text) {
                Transition::Evaluated { correct, effect } => {
                    if correct {
                        writeln!(out, "Correct!")?;
                    } else {
                        writeln!(
                            out,
                            "Incorrect: {}  (:undo if it was a typo)",
                            session.state().pending_input()
                        )?;
                    }
                    if !await_effect(session, effect, &mut lines, out).await? {
                        break;
                    }
                }
                Transition::Ignored(IgnoredReason::NoCurrentItem) => {
                    writeln!(out, "Nothing to answer right now.")?;
                }
                other => debug!(?other, "cli: answer not evaluated"),
            },
        }

        if session.phase() == SessionPhase::Unauthenticated {
            writeln!(out, "Signed out.")?;
            break;
        }
        render(session, out)?;
    }
    Ok(())
}

/// Holds the feedback for the effect's delay, accepting `:undo` meanwhile.
/// Returns `false` if the user quit.
async fn await_effect<R, W>(
    session: &mut SessionController,
    effect: DeferredEffect,
    lines: &mut Lines<R>,
    out: &mut W,
) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    if effect.delay.is_zero() {
        print_outcome(session.apply_effect(effect).await, out)?;
        return Ok(true);
    }

    let deadline = Instant::now() + effect.delay;
    loop {
        tokio::select! {
            _ = sleep_until(deadline) => {
                print_outcome(session.apply_effect(effect).await, out)?;
                return Ok(true);
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    print_outcome(session.apply_effect(effect).await, out)?;
                    return Ok(false);
                };
                match parse_command(&line) {
                    Command::Undo => {
                        let transition = session.undo();
                        let cancelled = transition == Transition::UndoApplied;
                        print_undo(transition, out)?;
                        // The pending requeue was dropped; nothing left to wait for.
                        if cancelled {
                            return Ok(true);
                        }
                    }
                    Command::Quit => return Ok(false),
                    Command::Empty => {}
                    _ => writeln!(out, "(wait for the next card)")?,
                }
            }
        }
    }
}

fn print_undo<W: Write>(transition: Transition, out: &mut W) -> anyhow::Result<()> {
    match transition {
        Transition::UndoApplied => writeln!(out, "Undone; try that card again.")?,
        _ => writeln!(out, "Nothing to undo.")?,
    }
    Ok(())
}

fn print_outcome<W: Write>(result: ReviewResult<Transition>, out: &mut W) -> anyhow::Result<()> {
    match result {
        Ok(Transition::BatchLoaded {
            items,
            total_pending,
            ..
        }) => writeln!(out, "Loaded {items} cards ({total_pending} kanji due).")?,
        Ok(Transition::Ignored(IgnoredReason::NothingNew)) => {
            writeln!(out, "Nothing new to learn yet. Come back later.")?
        }
        Ok(other) => debug!(?other, "cli: transition"),
        Err(ReviewError::AuthExpired) => writeln!(out, "Your session expired.")?,
        Err(err) => writeln!(out, "error: {err}")?,
    }
    Ok(())
}

fn render<W: Write>(session: &SessionController, out: &mut W) -> anyhow::Result<()> {
    match session.phase() {
        SessionPhase::Active => {
            if let (Some(item), Some(placeholder)) = (session.current_item(), session.placeholder())
            {
                writeln!(
                    out,
                    "[{} left, {} due] {}  {placeholder}",
                    session.remaining(),
                    session.total_pending(),
                    item.prompt
                )?;
            }
        }
        SessionPhase::Completed => {
            if let Some(summary) = session.completion_summary() {
                writeln!(
                    out,
                    "Batch complete: {} of {} kanji without a miss.",
                    summary.perfect,
                    summary.scores.len()
                )?;
                for score in summary.scores.iter().filter(|s| s.misses > 0) {
                    writeln!(out, "  {} missed {}x", score.kanji, score.misses)?;
                }
            }
            writeln!(out, "Type :more to learn new kanji or :quit to leave.")?;
        }
        SessionPhase::Loading | SessionPhase::Exhausted => {
            if let Some(err) = session.last_error() {
                writeln!(out, "Loading stalled: {err}. Type :retry to try again.")?;
            }
        }
        SessionPhase::Unauthenticated => writeln!(out, "Not signed in.")?,
    }
    Ok(())
}
