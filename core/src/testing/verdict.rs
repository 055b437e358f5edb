use std::{
    fmt,
    io::{BufReader, Read as _},
    ops::{BitOr, BitOrAssign},
    path::Path,
};

use serde::Serialize;

use super::outcome::{RawStatus, RunOutcome};
use crate::problem::TestCase;

/// Marker written to stderr by the C++ runtime when an allocation fails.
pub const BAD_ALLOC_MARKER: &str = "std::bad_alloc";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum JudgeCode {
    AC,
    WA,
    TLE,
    RE,
    MLE,
}

impl JudgeCode {
    /// Power-of-two encoding so that OR-ing codes loses nothing.
    pub const fn bit(self) -> u8 {
        use JudgeCode::*;
        match self {
            AC => 1,
            WA => 2,
            TLE => 4,
            RE => 8,
            MLE => 16,
        }
    }
}

/// Bitwise OR of judge codes. The empty mask (`0`) means "not judged yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct StatusMask(u8);

impl StatusMask {
    pub const EMPTY: StatusMask = StatusMask(0);

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, code: JudgeCode) -> bool {
        self.0 & code.bit() != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<JudgeCode> for StatusMask {
    fn from(code: JudgeCode) -> Self {
        StatusMask(code.bit())
    }
}

impl BitOr for StatusMask {
    type Output = StatusMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        StatusMask(self.0 | rhs.0)
    }
}

impl BitOr<JudgeCode> for StatusMask {
    type Output = StatusMask;

    fn bitor(self, rhs: JudgeCode) -> Self::Output {
        StatusMask(self.0 | rhs.bit())
    }
}

impl BitOr for JudgeCode {
    type Output = StatusMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        StatusMask::from(self) | rhs
    }
}

impl BitOrAssign<JudgeCode> for StatusMask {
    fn bitor_assign(&mut self, rhs: JudgeCode) {
        self.0 |= rhs.bit();
    }
}

impl fmt::Display for StatusMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub testcase_id: u32,
    pub judge: JudgeCode,
}

/// Turns a [`RunOutcome`] into the final [`JudgeCode`].
#[derive(Debug, Clone)]
pub struct VerdictClassifier {
    mle_markers: Vec<String>,
}

impl Default for VerdictClassifier {
    fn default() -> Self {
        Self {
            mle_markers: vec![BAD_ALLOC_MARKER.to_owned()],
        }
    }
}

impl VerdictClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mle_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mle_markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn classify(&self, outcome: &RunOutcome, testcase: &TestCase) -> Verdict {
        let judge = match outcome.raw_status {
            RawStatus::Success => {
                if self::outputs_match(&testcase.captured_stdout, &testcase.expected_output) {
                    JudgeCode::AC
                } else {
                    JudgeCode::WA
                }
            }
            RawStatus::TimedOut => JudgeCode::TLE,
            RawStatus::RuntimeError => {
                if self.has_mle_marker(&testcase.captured_stderr) {
                    JudgeCode::MLE
                } else {
                    JudgeCode::RE
                }
            }
        };
        Verdict {
            testcase_id: outcome.testcase_id,
            judge,
        }
    }

    /// Scans stderr token by token. Tokens longer than the longest marker are
    /// skipped without being buffered.
    fn has_mle_marker(&self, stderr_path: &Path) -> bool {
        let Some(longest) = self.mle_markers.iter().map(String::len).max() else {
            return false
        };
        let mut token = Vec::with_capacity(longest);
        let mut overlong = false;

        for b in bytes_or_empty(stderr_path).chain(std::iter::once(b' ')) {
            if is_separator(b) {
                if !overlong && !token.is_empty() && self.is_marker(&token) {
                    return true;
                }
                token.clear();
                overlong = false;
            } else if token.len() < longest {
                token.push(b);
            } else {
                overlong = true;
            }
        }
        false
    }

    fn is_marker(&self, token: &[u8]) -> bool {
        self.mle_markers.iter().any(|m| m.as_bytes() == token)
    }
}

/// Compares the two files as the concatenation of their whitespace-separated tokens,
/// i.e. byte by byte with whitespace dropped. Both files are streamed.
/// An unreadable file counts as empty.
pub fn outputs_match(captured: &Path, expected: &Path) -> bool {
    let captured = bytes_or_empty(captured).filter(|&b| !is_separator(b));
    let expected = bytes_or_empty(expected).filter(|&b| !is_separator(b));
    captured.eq(expected)
}

fn is_separator(b: u8) -> bool {
    b.is_ascii_whitespace() || b == b'\x0b'
}

/// Buffered bytes of the file. Nothing if it cannot be opened; a read error ends the stream.
fn bytes_or_empty(path: &Path) -> impl Iterator<Item = u8> {
    let reader = fsutil::open_file(path)
        .map_err(|e| log::warn!("{}", e))
        .ok()
        .map(BufReader::new);
    let path = path.to_owned();
    reader
        .into_iter()
        .flat_map(|r| r.bytes())
        .map_while(move |b| {
            b.map_err(|e| log::warn!("Cannot read {}: {}", path.display(), e))
                .ok()
        })
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use strum::IntoEnumIterator;

    use super::*;
    use crate::testing::outcome::ProcessExit;

    fn outcome(raw_status: RawStatus) -> RunOutcome {
        RunOutcome {
            testcase_id: 1,
            elapsed: Duration::from_millis(10),
            peak_memory_kib: 1024,
            exit: ProcessExit::Code(0),
            raw_status,
        }
    }

    fn testcase(dir: &Path, stdout: &str, stderr: &str, expected: &str) -> TestCase {
        let t = TestCase::new(1, dir);
        fsutil::write(&t.captured_stdout, stdout).unwrap();
        fsutil::write(&t.captured_stderr, stderr).unwrap();
        fsutil::write(&t.expected_output, expected).unwrap();
        t
    }

    fn judge(raw: RawStatus, stdout: &str, stderr: &str, expected: &str) -> JudgeCode {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase(tmp.path(), stdout, stderr, expected);
        VerdictClassifier::new().classify(&outcome(raw), &t).judge
    }

    #[test]
    fn bits_are_distinct_powers_of_two() {
        let all = JudgeCode::iter().fold(StatusMask::EMPTY, |m, c| m | c);
        assert_eq!(all.bits(), 31);
        for c in JudgeCode::iter() {
            assert!(c.bit().is_power_of_two());
        }
        assert_eq!((JudgeCode::TLE | JudgeCode::MLE).bits(), 20);
    }

    #[test]
    fn display_and_parse_names() {
        assert_eq!(JudgeCode::MLE.to_string(), "MLE");
        assert_eq!("TLE".parse::<JudgeCode>().unwrap(), JudgeCode::TLE);
    }

    #[test]
    fn success_is_judged_by_tokens() {
        use RawStatus::Success;
        assert_eq!(judge(Success, "1 2 3\n", "", "1 2 3\n"), JudgeCode::AC);
        assert_eq!(judge(Success, "1  2\n3", "", "1 2 3\n"), JudgeCode::AC);
        assert_eq!(judge(Success, "hello_123", "", "hello_123\n"), JudgeCode::AC);
        assert_eq!(judge(Success, "\r\n1\t2\r\n", "", "1 2"), JudgeCode::AC);
        assert_eq!(judge(Success, "1 2 4\n", "", "1 2 3\n"), JudgeCode::WA);
        assert_eq!(judge(Success, "", "", "1\n"), JudgeCode::WA);
        assert_eq!(judge(Success, "", "", ""), JudgeCode::AC);
    }

    #[test]
    fn tokens_are_concatenated() {
        assert_eq!(judge(RawStatus::Success, "ab c", "", "a bc"), JudgeCode::AC);
    }

    #[test]
    fn timed_out_is_always_tle() {
        assert_eq!(judge(RawStatus::TimedOut, "1", "", "1"), JudgeCode::TLE);
        assert_eq!(
            judge(RawStatus::TimedOut, "", BAD_ALLOC_MARKER, "1"),
            JudgeCode::TLE
        );
    }

    #[test]
    fn runtime_error_with_marker_is_mle() {
        let stderr = "terminate called after throwing an instance of 'std::bad_alloc'\n  what():  std::bad_alloc\n";
        assert_eq!(judge(RawStatus::RuntimeError, "", stderr, ""), JudgeCode::MLE);
        assert_eq!(
            judge(RawStatus::RuntimeError, "", "Segmentation fault\n", ""),
            JudgeCode::RE
        );
        // Only a whole token counts.
        assert_eq!(
            judge(RawStatus::RuntimeError, "", "my_std::bad_alloc_thing", ""),
            JudgeCode::RE
        );
        assert_eq!(
            judge(RawStatus::RuntimeError, "", "std::bad_alloc_extra\n", ""),
            JudgeCode::RE
        );
        assert_eq!(
            judge(RawStatus::RuntimeError, "", "abort\tstd::bad_alloc", ""),
            JudgeCode::MLE
        );
    }

    #[test]
    fn large_outputs_are_compared_without_whitespace() {
        let tmp = tempfile::tempdir().unwrap();
        let t = TestCase::new(3, tmp.path());
        let line = "1234567890 ".repeat(1000);
        fsutil::write(&t.captured_stdout, format!("{}\n", line).repeat(500)).unwrap();
        fsutil::write(&t.expected_output, line.replace(' ', "").repeat(500)).unwrap();
        assert!(outputs_match(&t.captured_stdout, &t.expected_output));

        fsutil::write(&t.expected_output, line.repeat(499)).unwrap();
        assert!(!outputs_match(&t.captured_stdout, &t.expected_output));
    }

    #[test]
    fn no_markers_never_reclassifies() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase(tmp.path(), "", BAD_ALLOC_MARKER, "");
        let c = VerdictClassifier::new().mle_markers(Vec::<String>::new());
        assert_eq!(c.classify(&outcome(RawStatus::RuntimeError), &t).judge, JudgeCode::RE);
    }

    #[test]
    fn custom_markers() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase(tmp.path(), "", "MemoryError\n", "");
        let c = VerdictClassifier::new().mle_markers(["MemoryError"]);
        assert_eq!(c.classify(&outcome(RawStatus::RuntimeError), &t).judge, JudgeCode::MLE);
    }

    #[test]
    fn missing_files_count_as_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let t = TestCase::new(5, tmp.path());
        let v = VerdictClassifier::new().classify(&outcome(RawStatus::Success), &t);
        assert_eq!(v.judge, JudgeCode::AC);
        let v = VerdictClassifier::new().classify(&outcome(RawStatus::RuntimeError), &t);
        assert_eq!(v.judge, JudgeCode::RE);
    }

    #[test]
    fn judging_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let t = testcase(tmp.path(), "42\n", "", "42");
        let c = VerdictClassifier::new();
        let first = c.classify(&outcome(RawStatus::Success), &t);
        let second = c.classify(&outcome(RawStatus::Success), &t);
        assert_eq!(first, second);
    }
}
