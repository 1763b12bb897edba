use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct PaletteColor {
    pub token: &'static str,
    pub hex: &'static str,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct ChartBucket {
    pub label: String,
    pub count: usize,
    pub color: PaletteColor,
}

#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub display_name: String,
    pub color: PaletteColor,
}

#[derive(Debug, Serialize, Clone, Default)]
pub struct Chart {
    pub buckets: Vec<ChartBucket>,
    pub legend: HashMap<String, LegendEntry>,
    pub classified: usize,
    pub failed: usize,
}
