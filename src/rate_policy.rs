//! # Stage: RatePolicy
//!
//! ## Responsibility
//! Decide, per event kind, whether an observed hook invocation becomes an
//! outbound message or is suppressed as a duplicate / too-frequent repeat.
//!
//! ## Guarantees
//! - Deterministic: the same `(value, now_ms)` sequence always yields the same
//!   accept/suppress sequence
//! - State changes only on acceptance
//! - A changed score is never suppressed
//! - A clock that moves backwards counts as zero elapsed time
//! - Non-panicking
//!
//! ## NOT Responsible For
//! - Reading the clock (callers pass `now_ms` explicitly)
//! - Sending anything

use serde_json::Value;

use crate::config::BridgeConfig;

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// Outcome of one rate-policy check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Suppress,
}

impl Decision {
    pub fn is_accept(self) -> bool {
        self == Decision::Accept
    }
}

// ---------------------------------------------------------------------------
// Start rule
// ---------------------------------------------------------------------------

/// At most one acceptance per rolling `window_ms`.
#[derive(Debug, Clone)]
pub struct StartRule {
    window_ms: u64,
    last_accepted_at_ms: Option<u64>,
}

impl StartRule {
    pub fn new(window_ms: u64) -> Self {
        Self { window_ms, last_accepted_at_ms: None }
    }

    pub fn decide(&mut self, now_ms: u64) -> Decision {
        if let Some(last) = self.last_accepted_at_ms {
            if now_ms.saturating_sub(last) < self.window_ms {
                return Decision::Suppress;
            }
        }
        self.last_accepted_at_ms = Some(now_ms);
        Decision::Accept
    }

    pub fn last_accepted_at_ms(&self) -> Option<u64> {
        self.last_accepted_at_ms
    }
}

// ---------------------------------------------------------------------------
// Score rule
// ---------------------------------------------------------------------------

/// Accepts a value when it changed, or when `heartbeat_ms` passed since the
/// last acceptance.
#[derive(Debug, Clone)]
pub struct ScoreRule {
    heartbeat_ms: u64,
    last_accepted_value: Option<f64>,
    last_accepted_at_ms: Option<u64>,
}

impl ScoreRule {
    pub fn new(heartbeat_ms: u64) -> Self {
        Self {
            heartbeat_ms,
            last_accepted_value: None,
            last_accepted_at_ms: None,
        }
    }

    pub fn decide(&mut self, value: f64, now_ms: u64) -> Decision {
        let repeat = self.last_accepted_value == Some(value);
        let recent = self
            .last_accepted_at_ms
            .is_some_and(|last| now_ms.saturating_sub(last) < self.heartbeat_ms);
        if repeat && recent {
            return Decision::Suppress;
        }
        self.last_accepted_value = Some(value);
        self.last_accepted_at_ms = Some(now_ms);
        Decision::Accept
    }

    pub fn last_accepted_value(&self) -> Option<f64> {
        self.last_accepted_value
    }

    pub fn last_accepted_at_ms(&self) -> Option<u64> {
        self.last_accepted_at_ms
    }
}

// ---------------------------------------------------------------------------
// RatePolicy
// ---------------------------------------------------------------------------

/// The three independent rules the bridge consults.
#[derive(Debug, Clone)]
pub struct RatePolicy {
    start: StartRule,
    score: ScoreRule,
    checkpoint: ScoreRule,
}

impl RatePolicy {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            start: StartRule::new(config.start_window_ms),
            score: ScoreRule::new(config.score_heartbeat_ms),
            checkpoint: ScoreRule::new(config.checkpoint_heartbeat_ms),
        }
    }

    pub fn accept_start(&mut self, now_ms: u64) -> Decision {
        self.start.decide(now_ms)
    }

    /// `score` must already be normalized with [`coerce_score`].
    pub fn accept_score(&mut self, score: f64, now_ms: u64) -> Decision {
        self.score.decide(score, now_ms)
    }

    pub fn accept_checkpoint(&mut self, score: f64, now_ms: u64) -> Decision {
        self.checkpoint.decide(score, now_ms)
    }

    pub fn start_rule(&self) -> &StartRule {
        &self.start
    }

    pub fn score_rule(&self) -> &ScoreRule {
        &self.score
    }
}

impl Default for RatePolicy {
    fn default() -> Self {
        Self::new(&BridgeConfig::default())
    }
}

// ---------------------------------------------------------------------------
// Score coercion
// ---------------------------------------------------------------------------

/// Normalize a hook argument to a score.
///
/// Follows dynamic numeric coercion: numbers pass through, booleans map to
/// 1/0, strings are parsed as numeric literals, arrays coerce through their
/// comma-joined string form (so `[7]` is 7 but `[true]` and `[1, 2]` are not
/// numbers). Anything that does not coerce, and any NaN, `-0` or non-finite
/// result, becomes `0`.
pub fn coerce_score(arg: Option<&Value>) -> f64 {
    let n = match arg {
        None | Some(Value::Null) => 0.0,
        Some(v) => to_number(v),
    };
    if !n.is_finite() || n == 0.0 {
        0.0
    } else {
        n
    }
}

fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => parse_numeric_literal(s),
        Value::Array(_) => parse_numeric_literal(&to_display_string(value)),
        Value::Object(_) => f64::NAN,
    }
}

/// String form of a value as an array join would render it.
fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_display_string).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn parse_numeric_literal(text: &str) -> f64 {
    let t = text.trim();
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }

    let radix = match t.get(..2) {
        Some("0x" | "0X") => Some(16),
        Some("0o" | "0O") => Some(8),
        Some("0b" | "0B") => Some(2),
        _ => None,
    };
    if let Some(radix) = radix {
        let digits = &t[2..];
        if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
            return f64::NAN;
        }
        // Wider than 64 bits still yields a (possibly infinite) float.
        return digits
            .chars()
            .filter_map(|c| c.to_digit(radix))
            .fold(0.0, |acc, d| acc * f64::from(radix) + f64::from(d));
    }

    // `f64::from_str` also accepts "inf" and "nan"; keep to decimal literals.
    let decimal = t
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
    if decimal {
        t.parse::<f64>().unwrap_or(f64::NAN)
    } else {
        f64::NAN
    }
}
