use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};

/// Progress bar for a fixed number of Monte Carlo steps, drawn on stderr.
pub struct StepProgress {
    pb: ProgressBar,
}

impl StepProgress {
    pub fn new(total_steps: u64, hidden: bool) -> Self {
        let pb = ProgressBar::new(total_steps).with_style(Self::bar_style());
        if hidden {
            pb.set_draw_target(ProgressDrawTarget::hidden());
        } else {
            pb.set_draw_target(ProgressDrawTarget::stderr());
        }
        pb.set_message("Monte Carlo");
        Self { pb }
    }

    pub fn inc(&self, acceptance: f64) {
        self.pb.inc(1);
        if self.pb.position() % 100 == 0 {
            self.pb
                .set_message(format!("acc {:>5.1}%", 100.0 * acceptance));
        }
    }

    /// Prints a line above the bar without disturbing it.
    pub fn println(&self, msg: impl AsRef<str>) {
        self.pb.println(format!("  {}", msg.as_ref()));
    }

    pub fn finish(&self) {
        if self.pb.position() < self.pb.length().unwrap_or(0) {
            self.pb.set_position(self.pb.length().unwrap_or(0));
        }
        self.pb.finish_with_message("✓ Done");
    }

    pub fn position(&self) -> u64 {
        self.pb.position()
    }

    pub fn is_finished(&self) -> bool {
        self.pb.is_finished()
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template("{msg:<20} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .with_key(
                "eta",
                |state: &ProgressState, w: &mut dyn std::fmt::Write| {
                    let _ = write!(w, "{:.1}s", state.eta().as_secs_f64());
                },
            )
            .progress_chars("##-")
    }
}
