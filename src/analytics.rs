// Presentation helpers for the per-document word counts returned by the
// upload endpoint.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
}

impl WordCount {
    pub fn new(word: impl Into<String>, count: u64) -> Self {
        Self {
            word: word.into(),
            count,
        }
    }
}

/// Horizontal bar chart, one line per word, bars scaled so the largest
/// count spans `width` cells.
pub fn render_bar_chart(counts: &[WordCount], width: usize) -> String {
    let max = counts.iter().map(|c| c.count).max().unwrap_or(0);
    let label_width = counts.iter().map(|c| c.word.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for entry in counts {
        let bar_len = if max == 0 {
            0
        } else {
            ((entry.count as f64 / max as f64) * width as f64).round() as usize
        };
        out.push_str(&format!(
            "{:<label_width$} {} {}\n",
            entry.word,
            "█".repeat(bar_len),
            entry.count,
            label_width = label_width
        ));
    }
    out
}

/// Relative size of each word in a word cloud, linear between 1.0 (rarest)
/// and 3.0 (most frequent). Equal counts all get the middle size.
pub fn cloud_weights(counts: &[WordCount]) -> Vec<(String, f32)> {
    let min = counts.iter().map(|c| c.count).min().unwrap_or(0);
    let max = counts.iter().map(|c| c.count).max().unwrap_or(0);

    counts
        .iter()
        .map(|c| {
            let weight = if max == min {
                2.0
            } else {
                1.0 + 2.0 * (c.count - min) as f32 / (max - min) as f32
            };
            (c.word.clone(), weight)
        })
        .collect()
}
