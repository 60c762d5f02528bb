//! Selection policy: which series and which entries get downloaded
//!
//! Deciding happens per series (`should_download`), planning per entry. Positions used by
//! the per-series limit are always chronological (1 = earliest), independent of the order
//! downloads are carried out in.

use crate::catalog::Catalog;
use crate::config::RunOptions;
use crate::utils::format_size;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

/// Source of yes/no answers from the operator
#[async_trait]
pub trait Prompter: Send {
    /// Ask `question`; only a case-insensitive `y` accepts, anything else declines
    async fn confirm(&mut self, question: &str) -> bool;
}

/// Interpret one answer line
///
/// Exactly `y`/`Y` (line terminator aside) accepts. `n`, any other input, and end of input
/// decline.
pub fn parse_answer(line: Option<&str>) -> bool {
    line.is_some_and(|l| l.trim_end_matches(['\r', '\n']).eq_ignore_ascii_case("y"))
}

/// Prompts on stdout and reads answers from stdin
pub struct StdinPrompter {
    lines: tokio::io::Lines<BufReader<tokio::io::Stdin>>,
}

impl StdinPrompter {
    /// Attach to the process's stdin
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for StdinPrompter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Prompter for StdinPrompter {
    async fn confirm(&mut self, question: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let prompt = format!("{} (y/n)? ", question);
        if stdout.write_all(prompt.as_bytes()).await.is_err() || stdout.flush().await.is_err() {
            return false;
        }
        let line = self.lines.next_line().await.ok().flatten();
        let accepted = parse_answer(line.as_deref());
        debug!(question, accepted, "prompt answered");
        accepted
    }
}

/// Answers from a fixed script, declining once the script runs out
///
/// Records every question asked, which makes it handy for tests and unattended runs.
#[derive(Clone, Debug, Default)]
pub struct ScriptedPrompter {
    answers: VecDeque<String>,
    /// Questions in the order they were asked
    pub asked: Vec<String>,
}

impl ScriptedPrompter {
    /// Script the given answers
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: answers.into_iter().map(Into::into).collect(),
            asked: Vec::new(),
        }
    }
}

#[async_trait]
impl Prompter for ScriptedPrompter {
    async fn confirm(&mut self, question: &str) -> bool {
        self.asked.push(question.to_string());
        parse_answer(self.answers.pop_front().as_deref())
    }
}

/// Outcome of the selection step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Downloads were disabled for this run
    Disabled,
    /// Every classified entry is already present
    NothingMissing,
    /// Top-up mode found no partially present series
    NothingToTopUp,
    /// `should_download` flags are set; see [`plan`]
    Selected,
}

/// Set each series' `should_download` flag according to the run mode and operator answers
pub async fn decide(
    catalog: &mut Catalog,
    options: &RunOptions,
    prompter: &mut dyn Prompter,
) -> Decision {
    if options.no_downloads {
        for s in &mut catalog.series {
            s.should_download = false;
        }
        return Decision::Disabled;
    }

    let totals = catalog.totals();
    if totals.is_complete() {
        return Decision::NothingMissing;
    }

    if options.top_up {
        let mut any = false;
        for s in &mut catalog.series {
            s.should_download = s.is_partial();
            any |= s.should_download;
        }
        return if any {
            Decision::Selected
        } else {
            Decision::NothingToTopUp
        };
    }

    let everything = format!(
        "Download everything ({})",
        format_size(totals.missing_bytes())
    );
    if prompter.confirm(&everything).await {
        for s in &mut catalog.series {
            s.should_download = true;
        }
        return Decision::Selected;
    }

    for s in &mut catalog.series {
        s.should_download = if s.has_missing() {
            let question = format!("Download {} ({})", s.name, format_size(s.missing_bytes()));
            prompter.confirm(&question).await
        } else {
            false
        };
    }
    Decision::Selected
}

/// Downloads planned for one series
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeriesPlan {
    /// Index into [`Catalog::series`]
    pub series: usize,
    /// Entry indices to fetch, in download order
    pub entries: Vec<usize>,
    /// Missing entries left out because of the per-series limit
    pub skipped_by_limit: usize,
}

/// Turn `should_download` flags into an ordered list of entries to fetch
///
/// Series follow table order. Within a series, missing entries come oldest-first (or
/// newest-first with `reverse`); with a non-zero `limit`, only entries at chronological
/// positions `1..=limit` are eligible.
pub fn plan(catalog: &Catalog, options: &RunOptions) -> Vec<SeriesPlan> {
    if options.no_downloads {
        return Vec::new();
    }

    let mut plans = Vec::new();
    for (series_index, s) in catalog.series.iter().enumerate() {
        if !s.should_download {
            continue;
        }

        let order: Box<dyn Iterator<Item = usize>> = if options.reverse {
            Box::new((0..s.entries.len()).rev())
        } else {
            Box::new(0..s.entries.len())
        };

        let mut entries = Vec::new();
        let mut skipped_by_limit = 0;
        for index in order {
            if s.entries[index].present {
                continue;
            }
            let position = index + 1;
            if options.limit > 0 && position > options.limit {
                skipped_by_limit += 1;
                continue;
            }
            entries.push(index);
        }

        if !entries.is_empty() || skipped_by_limit > 0 {
            plans.push(SeriesPlan {
                series: series_index,
                entries,
                skipped_by_limit,
            });
        }
    }
    plans
}
