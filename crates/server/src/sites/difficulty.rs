//! Display attributes of an estimated difficulty.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Difficulty {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub color: &'static str,
    pub text_color: &'static str,
    /// Fill ratio of the difficulty circle, in `[0, 1]`.
    pub rate: f64,
    pub value: i64,
}

const GREY: &str = "rgb(128, 128, 128)";
const BROWN: &str = "rgb(128, 64, 0)";
const GREEN: &str = "rgb(0, 128, 0)";
const CYAN: &str = "rgb(0, 192, 192)";
const BLUE: &str = "rgb(0, 0, 255)";
const YELLOW: &str = "rgb(192, 192, 0)";
const ORANGE: &str = "rgb(255, 128, 0)";
const RED: &str = "rgb(255, 0, 0)";
const BRONZE: &str = "rgb(150, 92, 44)";
const GOLD: &str = "rgb(255, 215, 0)";

/// Rating bands of 400 points, lowest first.
const BANDS: [&str; 8] = [GREY, BROWN, GREEN, CYAN, BLUE, YELLOW, ORANGE, RED];

fn band(difficulty: i64) -> usize {
    (difficulty.max(0) / 400) as usize
}

fn text_color(difficulty: i64) -> &'static str {
    BANDS[band(difficulty).min(BANDS.len() - 1)]
}

fn color(difficulty: i64) -> &'static str {
    match band(difficulty) {
        b if b < BANDS.len() => BANDS[b],
        8 => BRONZE,
        9 => GREY,
        _ => GOLD,
    }
}

fn rate(difficulty: i64) -> f64 {
    let mut display = difficulty as f64;
    if difficulty < 400 {
        display = (400.0 / (1.0 - display / 400.0).exp()).round();
    }
    if display >= 3200.0 { 1.0 } else { (display % 400.0) / 400.0 }
}

pub fn resolve(difficulty: i64) -> Difficulty {
    Difficulty {
        kind: if difficulty >= 3200 { "medal" } else { "normal" },
        color: color(difficulty),
        text_color: text_color(difficulty),
        rate: rate(difficulty),
        value: difficulty,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bands() {
        assert_eq!(resolve(-500).color, GREY);
        assert_eq!(resolve(399).color, GREY);
        assert_eq!(resolve(400).color, BROWN);
        assert_eq!(resolve(1999).color, BLUE);
        assert_eq!(resolve(2800).color, RED);
        assert_eq!(resolve(3300).color, BRONZE);
        assert_eq!(resolve(3700).color, GREY);
        assert_eq!(resolve(4100).color, GOLD);
        assert_eq!(resolve(4100).text_color, RED);
    }

    #[test]
    fn test_kind_and_rate() {
        assert_eq!(resolve(3199).kind, "normal");
        assert_eq!(resolve(3200).kind, "medal");
        assert_eq!(resolve(3200).rate, 1.0);
        assert_eq!(resolve(1000).rate, 0.5);
        // 400 / e^(1 - 0) rounds to 147.
        assert_eq!(resolve(0).rate, 147.0 / 400.0);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(resolve(1200)).unwrap();
        assert_eq!(json["type"], "normal");
        assert_eq!(json["textColor"], CYAN);
        assert_eq!(json["value"], 1200);
    }
}
