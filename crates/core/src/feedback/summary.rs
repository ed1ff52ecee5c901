use crate::emotion::{Emotion, EmotionSnapshot};
use crate::session::SessionLog;

pub const NO_EXPRESSION_DATA: &str = "No facial expression data captured.";

/// Per-emotion mean of a series. `None` for an empty series: no data is not zero.
pub fn emotion_means(series: &[EmotionSnapshot]) -> Option<EmotionSnapshot> {
    if series.is_empty() {
        return None;
    }
    let n = series.len() as f32;
    Some(EmotionSnapshot::from_fn(|e| {
        series.iter().map(|s| s.get(e)).sum::<f32>() / n
    }))
}

/// Emotions whose mean exceeds `threshold`, strongest first.
pub fn material_emotions(means: &EmotionSnapshot, threshold: f32) -> Vec<(Emotion, f32)> {
    let mut ranked: Vec<_> = means.iter().filter(|(_, v)| *v > threshold).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
    ranked
}

/// One-line description of a turn's expressions for the evaluation prompt.
pub fn describe_emotions(series: &[EmotionSnapshot], threshold: f32) -> String {
    let Some(means) = emotion_means(series) else {
        return NO_EXPRESSION_DATA.to_owned();
    };
    let dominant = material_emotions(&means, threshold)
        .into_iter()
        .map(|(e, v)| format!("{}: {}%", e.as_str(), (v * 100.0).round() as i32))
        .collect::<Vec<_>>()
        .join(", ");
    if dominant.is_empty() {
        "Average emotional expression: Neutral.".to_owned()
    } else {
        format!("Average emotional expression: {dominant}.")
    }
}

/// Whole-session mean per emotion above `threshold`, in canonical order.
pub fn emotion_distribution(log: &SessionLog, threshold: f32) -> Vec<(Emotion, f32)> {
    let all: Vec<EmotionSnapshot> = log
        .turns()
        .iter()
        .flat_map(|t| t.emotion_data.iter().copied())
        .collect();
    match emotion_means(&all) {
        Some(means) => means.iter().filter(|(_, v)| *v > threshold).collect(),
        None => Vec::new(),
    }
}
