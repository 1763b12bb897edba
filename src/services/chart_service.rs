use crate::models::chart_types::{Chart, ChartBucket, LegendEntry, PaletteColor};
use crate::models::classify_types::display_name;
use crate::services::intake::FileCollection;
use std::collections::HashMap;

/// Fixed chart palette. Buckets past the end wrap around and reuse colors.
pub const PALETTE: [PaletteColor; 5] = [
    PaletteColor { token: "chart-1", hex: "#E76E50" },
    PaletteColor { token: "chart-2", hex: "#2A9D90" },
    PaletteColor { token: "chart-3", hex: "#274754" },
    PaletteColor { token: "chart-4", hex: "#E8C468" },
    PaletteColor { token: "chart-5", hex: "#F4A462" },
];

pub fn palette_color(index: usize) -> PaletteColor {
    PALETTE[index % PALETTE.len()]
}

/// Count labels in first-seen order and assign palette colors by bucket index.
pub fn bucket_top_labels<I, S>(labels: I) -> Vec<ChartBucket>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<ChartBucket> = Vec::new();

    for label in labels {
        let label = label.as_ref();
        match positions.get(label) {
            Some(&i) => buckets[i].count += 1,
            None => {
                positions.insert(label.to_string(), buckets.len());
                buckets.push(ChartBucket {
                    label: label.to_string(),
                    count: 1,
                    color: palette_color(buckets.len()),
                });
            }
        }
    }

    buckets
}

/// Chart of top labels, or `None` while any file is still pending.
///
/// Failed files, and classified files whose result came back empty, are left
/// out of the buckets and counted in `failed`.
pub fn build_chart(collection: &FileCollection) -> Option<Chart> {
    if collection.is_empty() || !collection.all_settled() {
        return None;
    }

    let mut top_labels = Vec::with_capacity(collection.len());
    let mut failed = 0;
    for file in collection.files() {
        match file.state.result().and_then(|r| r.top()) {
            Some(top) => top_labels.push(top.label.as_str()),
            None => failed += 1,
        }
    }

    let buckets = bucket_top_labels(&top_labels);
    let legend = buckets
        .iter()
        .map(|b| {
            (
                b.label.clone(),
                LegendEntry {
                    display_name: display_name(&b.label).to_string(),
                    color: b.color,
                },
            )
        })
        .collect();

    Some(Chart {
        buckets,
        legend,
        classified: top_labels.len(),
        failed,
    })
}
