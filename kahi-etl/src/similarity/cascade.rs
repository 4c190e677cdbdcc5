//! Ordered "first match wins" evaluation of scoring stages
//!
//! A cascade is a list of stages. Each stage has a scorer, a cutoff, an
//! optional gate on the previous stage's score, and a guard on the input.
//! Evaluation walks the stages in order:
//! - a stage whose guard rejects the input is skipped;
//! - a gated stage runs only if the last evaluated score exceeded the gate,
//!   otherwise the cascade stops with no match;
//! - the first stage whose score passes its cutoff is the match.

/// Score threshold of one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    /// score >= value
    AtLeast(f64),
    /// score > value
    Above(f64),
}

impl Cutoff {
    pub fn passes(&self, score: f64) -> bool {
        match *self {
            Cutoff::AtLeast(t) => score >= t,
            Cutoff::Above(t) => score > t,
        }
    }
}

/// One scoring stage over input `I`
pub struct Stage<I> {
    pub label: &'static str,
    pub scorer: fn(&I) -> f64,
    pub cutoff: Cutoff,
    /// Minimum score of the previously evaluated stage
    pub gate: Option<f64>,
    /// Input precondition; `false` skips the stage
    pub guard: fn(&I) -> bool,
}

fn always<I>(_: &I) -> bool {
    true
}

impl<I> Stage<I> {
    pub fn new(label: &'static str, scorer: fn(&I) -> f64, cutoff: Cutoff) -> Self {
        Self {
            label,
            scorer,
            cutoff,
            gate: None,
            guard: always::<I>,
        }
    }

    pub fn gated(mut self, gate: f64) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn guarded(mut self, guard: fn(&I) -> bool) -> Self {
        self.guard = guard;
        self
    }
}

/// Which stage matched, and with what score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageHit {
    pub stage: usize,
    pub label: &'static str,
    pub score: f64,
}

/// Ordered list of stages
pub struct Cascade<I> {
    stages: Vec<Stage<I>>,
}

impl<I> Cascade<I> {
    pub fn new(stages: Vec<Stage<I>>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage<I>] {
        &self.stages
    }

    /// Run the stages; `None` means no confident match
    pub fn evaluate(&self, input: &I) -> Option<StageHit> {
        let mut last_score: Option<f64> = None;

        for (idx, stage) in self.stages.iter().enumerate() {
            if !(stage.guard)(input) {
                continue;
            }
            if let (Some(gate), Some(previous)) = (stage.gate, last_score) {
                if previous <= gate {
                    tracing::trace!(stage = stage.label, previous, gate, "Cascade stopped at gate");
                    return None;
                }
            }

            let score = (stage.scorer)(input);
            if stage.cutoff.passes(score) {
                return Some(StageHit {
                    stage: idx,
                    label: stage.label,
                    score,
                });
            }
            last_score = Some(score);
        }

        None
    }
}
