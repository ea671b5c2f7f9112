//! Terminal rater used by the binary.

use std::io::{self, BufRead, StdinLock, Stdout, Write};

use crate::compute::evolution::{
    MAX_SCORE, MIN_SCORE, Rater, RatingError, RatingOutcome, RatingRequest,
};
use crate::schema::{HistorySummary, LeaderboardEntry};

/// Asks for ratings on a line-based terminal.
///
/// Accepted answers: a score in `0-10`, `s` to skip, `r` for the results
/// view, `q` to quit. End of input quits.
pub struct ConsoleRater<R, W> {
    input: R,
    output: W,
}

impl ConsoleRater<StdinLock<'static>, Stdout> {
    /// Rater on the process's stdin and stdout.
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> ConsoleRater<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Consume the rater, returning the output sink.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Read one trimmed line, `None` at end of input.
    fn read_answer(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_lowercase()))
    }

    fn print_leaderboard(&mut self, leaderboard: &[LeaderboardEntry]) -> io::Result<()> {
        for (i, entry) in leaderboard.iter().enumerate() {
            writeln!(
                self.output,
                "{}. {} + {} - score {:.2}",
                i + 1,
                entry.image,
                entry.audio,
                entry.score
            )?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Rater for ConsoleRater<R, W> {
    fn rate(&mut self, request: &RatingRequest<'_>) -> Result<RatingOutcome, RatingError> {
        if !request.leaderboard.is_empty() {
            writeln!(self.output, "--- Current top ---")?;
            self.print_leaderboard(request.leaderboard)?;
        }
        writeln!(self.output, "Image: {}", request.image_path.display())?;
        writeln!(self.output, "Audio: {}", request.audio_path.display())?;

        loop {
            write!(
                self.output,
                "Score {}-{} (s = skip, r = results, q = quit): ",
                MIN_SCORE, MAX_SCORE
            )?;
            self.output.flush()?;

            let Some(answer) = self.read_answer()? else {
                return Ok(RatingOutcome::Terminate {
                    show_results: false,
                });
            };

            match answer.as_str() {
                "s" => return Ok(RatingOutcome::Skipped),
                "r" => return Ok(RatingOutcome::Terminate { show_results: true }),
                "q" => {
                    return Ok(RatingOutcome::Terminate {
                        show_results: false,
                    });
                }
                other => match other.parse::<f32>() {
                    Ok(score) if (MIN_SCORE..=MAX_SCORE).contains(&score) => {
                        return Ok(RatingOutcome::Scored(score));
                    }
                    _ => writeln!(self.output, "Invalid answer: {:?}", other)?,
                },
            }
        }
    }

    fn show_results(
        &mut self,
        leaderboard: &[LeaderboardEntry],
        fitness_history: &[f32],
    ) -> Result<bool, RatingError> {
        writeln!(self.output)?;
        writeln!(self.output, "=== TOP {} ===", leaderboard.len())?;
        self.print_leaderboard(leaderboard)?;

        if let Some(summary) = HistorySummary::from_history(fitness_history) {
            writeln!(self.output, "=== FITNESS HISTORY ===")?;
            for (generation, average) in fitness_history.iter().enumerate() {
                // One mark per half point of average fitness.
                let bar = "#".repeat((average.max(0.0) * 2.0).round() as usize);
                writeln!(
                    self.output,
                    "Generation {:>3}: {:>5.2} {}",
                    generation + 1,
                    average,
                    bar
                )?;
            }
            writeln!(self.output, "Best: {:.2}", summary.best)?;
            writeln!(self.output, "Mean: {:.2}", summary.mean)?;
            writeln!(self.output, "Worst: {:.2}", summary.worst)?;
        }

        write!(self.output, "Continue evolving? [y/N]: ")?;
        self.output.flush()?;

        Ok(!matches!(self.read_answer()?.as_deref(), Some("y" | "yes")))
    }
}
