use serde::Serialize;

use super::verdict::{JudgeCode, StatusMask, Verdict};

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum AggregateError {
    #[error("Expected {expected} verdicts but got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Duplicate verdict for testcase {0}")]
    Duplicate(u32),

    #[error("Testcase {0} is out of range 1..={1}")]
    OutOfRange(u32, usize),
}

/// Collects verdicts until every testcase has one.
#[derive(Debug, Clone)]
pub struct ResultAggregator {
    testcase_count: usize,
    verdicts: Vec<Verdict>,
}

/// Summary over all testcases. Built only by [`ResultAggregator::finish`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub status_mask: StatusMask,
    pub correct_count: usize,
    pub testcase_count: usize,
    pub score_percent: f64,
}

impl ResultAggregator {
    pub fn new(testcase_count: usize) -> Self {
        Self {
            testcase_count,
            verdicts: Vec::with_capacity(testcase_count),
        }
    }

    pub fn push(&mut self, verdict: Verdict) -> Result<(), AggregateError> {
        let id = verdict.testcase_id;
        if id == 0 || id as usize > self.testcase_count {
            return Err(AggregateError::OutOfRange(id, self.testcase_count));
        }
        if self
            .verdicts
            .iter()
            .any(|v| v.testcase_id == verdict.testcase_id)
        {
            return Err(AggregateError::Duplicate(verdict.testcase_id));
        }
        self.verdicts.push(verdict);
        Ok(())
    }

    pub fn verdicts(&self) -> &[Verdict] {
        &self.verdicts
    }

    pub fn finish(self) -> Result<AggregateResult, AggregateError> {
        if self.verdicts.len() != self.testcase_count {
            return Err(AggregateError::CountMismatch {
                expected: self.testcase_count,
                actual: self.verdicts.len(),
            });
        }
        let status_mask = self
            .verdicts
            .iter()
            .fold(StatusMask::EMPTY, |mask, v| mask | v.judge);
        let correct_count = self
            .verdicts
            .iter()
            .filter(|v| v.judge == JudgeCode::AC)
            .count();
        Ok(AggregateResult {
            status_mask,
            correct_count,
            testcase_count: self.testcase_count,
            score_percent: score_percent(correct_count, self.testcase_count),
        })
    }
}

/// `100 × correct / total`; zero testcases score zero.
pub fn score_percent(correct_count: usize, testcase_count: usize) -> f64 {
    if testcase_count == 0 {
        return 0.0;
    }
    correct_count as f64 / testcase_count as f64 * 100.0
}

impl AggregateResult {
    pub fn all_correct(&self) -> bool {
        self.correct_count == self.testcase_count
    }

    /// Overall verdict: AC when everything passed, otherwise the most severe
    /// failure in the order TLE, MLE, RE, WA.
    pub fn headline(&self) -> JudgeCode {
        use JudgeCode::*;
        if self.all_correct() {
            return AC;
        }
        [TLE, MLE, RE]
            .into_iter()
            .find(|&code| self.status_mask.contains(code))
            .unwrap_or(WA)
    }

    /// Score truncated (not rounded) to two decimals, e.g. `"33.33"`.
    pub fn score_text(&self) -> String {
        let hundredths = (self.score_percent * 100.0 + 1e-9).floor() / 100.0;
        format!("{:.2}", hundredths)
    }
}
