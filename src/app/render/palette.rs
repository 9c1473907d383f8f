use eframe::egui::Color32;

use super::RenderConfig;

pub fn parse_hex(raw: &str) -> Option<Color32> {
    let hex = raw.trim().strip_prefix('#')?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();

    match hex.len() {
        3 => {
            let short = |index: usize| channel(index..index + 1).map(|value| value * 17);
            Some(Color32::from_rgb(short(0)?, short(1)?, short(2)?))
        }
        6 => Some(Color32::from_rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?)),
        _ => None,
    }
}

pub fn blend_color(base: Color32, overlay: Color32, amount: f32) -> Color32 {
    let amount = amount.clamp(0.0, 1.0);
    let inverse = 1.0 - amount;

    Color32::from_rgba_unmultiplied(
        ((base.r() as f32 * inverse) + (overlay.r() as f32 * amount)) as u8,
        ((base.g() as f32 * inverse) + (overlay.g() as f32 * amount)) as u8,
        ((base.b() as f32 * inverse) + (overlay.b() as f32 * amount)) as u8,
        ((base.a() as f32 * inverse) + (overlay.a() as f32 * amount)) as u8,
    )
}

pub fn with_opacity(color: Color32, opacity: f32) -> Color32 {
    let [r, g, b, a] = color.to_srgba_unmultiplied();
    Color32::from_rgba_unmultiplied(r, g, b, (a as f32 * opacity.clamp(0.0, 1.0)) as u8)
}

/// Colours resolved once from the configured hex strings.
#[derive(Clone, Debug)]
pub struct Palette {
    pub groups: Vec<Color32>,
    pub default_node: Color32,
    pub event: Color32,
    pub selected: Color32,
    pub highlight: Color32,
    pub root_core: Color32,
    pub label: Color32,
    pub edge: Color32,
    pub edge_selected: Color32,
    pub particle: Color32,
    pub background: Color32,
}

impl Palette {
    pub fn from_config(config: &RenderConfig) -> Self {
        let resolve = |raw: &str, fallback: Color32| parse_hex(raw).unwrap_or(fallback);

        Self {
            groups: config.group_palette.iter().filter_map(|raw| parse_hex(raw)).collect(),
            default_node: resolve(&config.default_color, Color32::from_rgb(66, 133, 244)),
            event: resolve(&config.event_color, Color32::from_rgb(255, 82, 82)),
            selected: resolve(&config.selected_color, Color32::from_rgb(245, 206, 93)),
            highlight: resolve(&config.highlight_color, Color32::from_rgb(255, 255, 160)),
            root_core: Color32::WHITE,
            label: resolve(&config.label_color, Color32::from_gray(227)),
            edge: resolve(&config.edge_color, Color32::from_rgb(100, 149, 237)),
            edge_selected: resolve(&config.edge_selected_color, Color32::from_rgb(246, 206, 104)),
            particle: Color32::WHITE,
            background: resolve(&config.background_color, Color32::from_rgb(5, 5, 5)),
        }
    }

    /// Group ids start at 1; anything lower has no group colour.
    pub fn group_color(&self, group_id: i64) -> Option<Color32> {
        if group_id < 1 || self.groups.is_empty() {
            return None;
        }
        let slot = (group_id - 1).rem_euclid(self.groups.len() as i64) as usize;
        self.groups.get(slot).copied()
    }
}
