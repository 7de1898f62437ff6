use serde::{Deserialize, Serialize};

/// Urgency classification for an inbound envelope.
///
/// The numeric value is what gets published as the priority header on the
/// lane stream; unrecognized values fall back to `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Normal,
    Low,
}

impl Priority {
    pub fn numeric(&self) -> u8 {
        match self {
            Priority::High => 10,
            Priority::Normal => 5,
            Priority::Low => 1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }

    /// Parse a lane name, falling back to `Normal` for anything unrecognized.
    pub fn parse(value: &str) -> Priority {
        match value {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_values() {
        assert_eq!(Priority::High.numeric(), 10);
        assert_eq!(Priority::Normal.numeric(), 5);
        assert_eq!(Priority::Low.numeric(), 1);
    }

    #[test]
    fn test_parse_falls_back_to_normal() {
        assert_eq!(Priority::parse("high"), Priority::High);
        assert_eq!(Priority::parse("urgent"), Priority::Normal);
        assert_eq!(Priority::parse(""), Priority::Normal);
    }
}
