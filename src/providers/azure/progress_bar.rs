use std::time::Duration;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Spinner for the three phases of a snapshot collection.
pub struct PhaseProgress {
    pb: ProgressBar,
}

impl PhaseProgress {
    fn spinner(message: String) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_draw_target(ProgressDrawTarget::stderr());
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    pub fn start_phase_1() -> Self {
        Self {
            pb: Self::spinner("Phase 1/3: Fetching pipeline catalog...".to_string()),
        }
    }

    pub fn finish_phase_1_start_phase_2(self, pipeline_count: usize, selected: usize) -> Self {
        self.pb
            .finish_with_message(format!("✓ Phase 1/3: Found {pipeline_count} pipelines"));

        Self {
            pb: Self::spinner(format!(
                "Phase 2/3: Fetching runs and stages for {selected} pipelines..."
            )),
        }
    }

    pub fn finish_phase_2_start_phase_3(self, run_count: usize) -> Self {
        self.pb
            .finish_with_message(format!("✓ Phase 2/3: Fetched {run_count} runs"));

        Self {
            pb: Self::spinner("Phase 3/3: Assembling snapshot...".to_string()),
        }
    }

    pub fn finish_phase_3(self) {
        self.pb
            .finish_with_message("✓ Phase 3/3: Snapshot assembled");
    }

    /// Clears the spinner when a phase fails.
    pub fn abandon(self, message: &str) {
        self.pb.abandon_with_message(format!("✗ {message}"));
    }
}
