use crate::cost::PassCost;
use crate::errors::GenerationError;
use crate::orchestrator::PassObserver;
use crate::planner::ChunkPlan;
use crate::review::{ReviewResult, ReviewStatus};
use crate::ui::icons::{CHECK, CLOCK, COST, CROSS, FOLDER, MERGE, RETRY, REVIEW, SPARKLE, WARN};
use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Terminal UI for a review run, rendered via `indicatif` progress bars.
///
/// Two bars are stacked vertically:
/// - Pass bar: how many planned passes have finished
/// - Activity bar: spinner with the current pass, retry or consolidation
///
/// Implements [`PassObserver`], so the orchestrator drives it directly.
pub struct ReviewUI {
    multi: MultiProgress,
    pass_bar: ProgressBar,
    activity_bar: ProgressBar,
    verbose: bool,
}

impl ReviewUI {
    pub fn new(verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let pass_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let pass_bar = multi.add(ProgressBar::new(0));
        pass_bar.set_style(pass_style);
        pass_bar.set_prefix("Passes");

        let activity_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg} {elapsed:.dim}")
            .expect("progress bar template is a valid static string");

        let activity_bar = multi.add(ProgressBar::new_spinner());
        activity_bar.set_style(activity_style);
        activity_bar.set_prefix("   Now");

        Self {
            multi,
            pass_bar,
            activity_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Print the run header before planning output.
    pub fn print_header(&self, project: &str, review: &str, model: &str, file_count: usize) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{}{} of {}",
            REVIEW,
            style(review).yellow().bold(),
            style(project).bold()
        ));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!("{}  {}", style("Model:").dim(), model));
        self.print_line(format!("{}  {}{} files", style("Files:").dim(), FOLDER, file_count));
        self.print_line("");
    }

    /// Print a warning line that must stay visible.
    pub fn warn(&self, msg: &str) {
        self.print_line(format!("{}{}", WARN, style(msg).yellow()));
    }

    fn finish_bars(&self) {
        self.activity_bar.finish_and_clear();
        self.pass_bar.finish();
    }
}

impl PassObserver for ReviewUI {
    fn on_plan(&self, plan: &ChunkPlan) {
        self.pass_bar.set_length(plan.chunks.len() as u64);
        if plan.chunks.len() > 1 {
            self.print_line(format!(
                "{} passes planned ({} usable tokens each): {}",
                style(plan.chunks.len()).cyan().bold(),
                plan.usable_tokens_per_pass,
                style(&plan.reason).dim()
            ));
            if self.verbose {
                for (i, chunk) in plan.chunks.iter().enumerate() {
                    self.print_line(format!(
                        "    Pass {}: {} files, ~{} tokens{}",
                        i + 1,
                        chunk.files.len(),
                        chunk.estimated_tokens,
                        if chunk.oversized { " (oversized)" } else { "" }
                    ));
                }
            }
        }
        for path in plan.oversized_files() {
            self.warn(&format!("{} exceeds the usable context window on its own", path));
        }
    }

    fn on_pass_start(&self, pass: u32, total: u32, files: &[String]) {
        self.pass_bar
            .set_message(format!("pass {} of {}", style(pass).cyan(), total));
        self.activity_bar.reset_elapsed();
        self.activity_bar.set_message(format!(
            "Reviewing {} files {}",
            files.len(),
            style(format!("(pass {})", pass)).dim()
        ));
        self.activity_bar
            .enable_steady_tick(Duration::from_millis(100));
        if self.verbose {
            for file in files {
                self.print_line(format!("    {} {}", style("→").dim(), style(file).dim()));
            }
        }
    }

    fn on_retry(&self, pass: u32, attempt: u32, error: &GenerationError, delay: Duration) {
        let label = if pass == 0 {
            "consolidation".to_string()
        } else {
            format!("pass {}", pass)
        };
        self.print_line(format!(
            "    {}{} attempt {} failed: {} {}",
            RETRY,
            label,
            attempt,
            style(error).yellow(),
            style(format!("(retrying in {}s)", delay.as_secs())).dim()
        ));
    }

    fn on_fallback(&self, pass: u32, model: &str) {
        self.print_line(format!(
            "    {}pass {}: switching to fallback model {}",
            RETRY,
            pass,
            style(model).yellow()
        ));
    }

    fn on_pass_complete(&self, pass: u32, cost: &PassCost) {
        self.pass_bar.inc(1);
        self.print_line(format!(
            "  {}Pass {} complete {}",
            CHECK,
            style(pass).green().bold(),
            style(format!(
                "({} in / {} out tokens, {})",
                cost.input_tokens,
                cost.output_tokens,
                crate::cost::format_cost(cost.estimated_cost)
            ))
            .dim()
        ));
    }

    fn on_pass_failed(&self, pass: u32, error: &GenerationError) {
        self.pass_bar.inc(1);
        self.print_line(format!(
            "  {}Pass {} failed: {}",
            CROSS,
            style(pass).red().bold(),
            error
        ));
    }

    fn on_consolidation_start(&self, model: &str, partials: usize) {
        self.activity_bar.reset_elapsed();
        self.activity_bar.set_message(format!(
            "{}Consolidating {} partial reviews with {}",
            MERGE,
            partials,
            style(model).cyan()
        ));
        self.activity_bar
            .enable_steady_tick(Duration::from_millis(100));
    }

    fn on_consolidation_complete(&self, consolidated: bool) {
        if consolidated {
            self.print_line(format!("  {}Consolidated partial reviews", CHECK));
        } else {
            self.warn("Consolidation failed; partial reviews will be concatenated");
        }
    }

    fn on_finish(&self, result: &ReviewResult) {
        self.finish_bars();
        match &result.status {
            ReviewStatus::Complete => self.print_line(format!(
                "\n{}{} complete!",
                SPARKLE,
                style(result.review_type.title()).green().bold()
            )),
            ReviewStatus::Incomplete { reason } => self.print_line(format!(
                "\n{}{} incomplete: {}",
                WARN,
                style(result.review_type.title()).yellow().bold(),
                reason
            )),
        }
        self.print_line(format!(
            "{}{} {}",
            COST,
            style(&result.cost.formatted_cost).bold(),
            style(format!(
                "({} tokens, {} of {} passes succeeded)",
                result.cost.total_tokens,
                result.succeeded_passes(),
                result.total_passes
            ))
            .dim()
        ));
        if result.potentially_truncated {
            self.warn("Forced single pass exceeded the usable context window; output may be truncated");
        }
        if self.verbose {
            self.print_line(format!(
                "{}finished at {}",
                CLOCK,
                result.timestamp.format("%H:%M:%S")
            ));
        }
    }
}

impl Drop for ReviewUI {
    fn drop(&mut self) {
        if !self.activity_bar.is_finished() {
            self.activity_bar.finish_and_clear();
        }
    }
}
