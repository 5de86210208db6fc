//! Messages sent from the game context to its host.

use serde::{Deserialize, Serialize, Serializer};

/// Scores at or above this magnitude are written as floats.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// One notification for the host page.
///
/// Wire shape: `{"type":"RUN_START"}`, `{"type":"SCORE","score":7}`,
/// `{"type":"SCORE_TICK","score":3}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OutboundMessage {
    #[serde(rename = "RUN_START")]
    RunStart,
    #[serde(rename = "SCORE")]
    Score {
        #[serde(serialize_with = "serialize_score")]
        score: f64,
    },
    /// In-run progress, forwarded from `notify_checkpoint`.
    #[serde(rename = "SCORE_TICK")]
    ScoreTick {
        #[serde(serialize_with = "serialize_score")]
        score: f64,
    },
}

impl OutboundMessage {
    /// The wire discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            OutboundMessage::RunStart => "RUN_START",
            OutboundMessage::Score { .. } => "SCORE",
            OutboundMessage::ScoreTick { .. } => "SCORE_TICK",
        }
    }

    pub fn score(&self) -> Option<f64> {
        match self {
            OutboundMessage::RunStart => None,
            OutboundMessage::Score { score } | OutboundMessage::ScoreTick { score } => Some(*score),
        }
    }

    /// Encode as a single-line JSON object.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl std::fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.score() {
            Some(score) => write!(f, "{}({score})", self.kind()),
            None => write!(f, "{}", self.kind()),
        }
    }
}

/// Integral scores go out as JSON integers, matching what the game reports.
fn serialize_score<S: Serializer>(score: &f64, s: S) -> Result<S::Ok, S::Error> {
    if score.fract() == 0.0 && score.abs() < MAX_SAFE_INTEGER {
        s.serialize_i64(*score as i64)
    } else {
        s.serialize_f64(*score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_start_wire_shape() {
        assert_eq!(OutboundMessage::RunStart.to_json().unwrap(), r#"{"type":"RUN_START"}"#);
    }

    #[test]
    fn test_integral_score_written_as_integer() {
        let msg = OutboundMessage::Score { score: 5.0 };
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"SCORE","score":5}"#);
    }

    #[test]
    fn test_fractional_score_written_as_float() {
        let msg = OutboundMessage::Score { score: 2.5 };
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"SCORE","score":2.5}"#);
    }

    #[test]
    fn test_score_tick_wire_shape() {
        let msg = OutboundMessage::ScoreTick { score: 12.0 };
        assert_eq!(msg.to_json().unwrap(), r#"{"type":"SCORE_TICK","score":12}"#);
    }

    #[test]
    fn test_parse_host_side() {
        let msg: OutboundMessage = serde_json::from_str(r#"{"type":"SCORE","score":7}"#).unwrap();
        assert_eq!(msg, OutboundMessage::Score { score: 7.0 });
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(serde_json::from_str::<OutboundMessage>(r#"{"type":"GAME_OVER"}"#).is_err());
    }

    #[test]
    fn test_display_and_kind() {
        assert_eq!(OutboundMessage::RunStart.to_string(), "RUN_START");
        assert_eq!(OutboundMessage::Score { score: 3.0 }.to_string(), "SCORE(3)");
        assert_eq!(OutboundMessage::ScoreTick { score: 1.0 }.kind(), "SCORE_TICK");
        assert_eq!(OutboundMessage::RunStart.score(), None);
    }
}
