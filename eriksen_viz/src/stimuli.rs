//! Stimulus drawing and the texture store.
//!
//! Layout numbers mirror the lab's original display: triplet centers 200 px
//! apart, stimulus images scaled to 150 px, a red 15 px dot for attention
//! checks. Classification never depends on anything here; this module only
//! puts pixels where the trial state machine says they belong.

use eriksen::stimulus::{RenderMode, StimulusSet};
use eriksen::trial::{CheckSpec, TrialSpec};
use macroquad::prelude::*;
use std::collections::HashMap;
use std::path::Path;

/// Center-to-center spacing of the flanker/target/flanker triplet.
const STIM_SPACING: f32 = 200.0;
/// Edge length stimulus images are scaled to.
const STIM_SIZE: f32 = 150.0;
/// Font of the one-line text stimulus.
const STIM_FONT: u16 = 48;
/// Mixed-mode flanker letters match the image height.
const MIXED_LETTER_FONT: u16 = STIM_SIZE as u16;
const FIXATION_FONT: u16 = 72;
/// Instruction-screen stimulus thumbnails.
pub const THUMB_SIZE: f32 = 80.0;

pub const INK: Color = BLACK;

/// Textures keyed by the config-relative asset path, loaded once at startup.
pub struct AssetStore {
    textures: HashMap<String, Texture2D>,
}

impl AssetStore {
    /// Load every image any module references. A missing or undecodable file
    /// aborts the session before the first trial rather than surfacing as a
    /// blank stimulus halfway through.
    pub async fn load(assets_dir: &Path, modules: &[StimulusSet]) -> Result<Self, String> {
        let mut textures = HashMap::new();
        for set in modules {
            for key in set.image_keys() {
                let Some(rel) = set.assets.get(key) else {
                    return Err(format!(
                        "module `{}`: no image asset mapped for `{key}`",
                        set.name
                    ));
                };
                if textures.contains_key(rel.as_str()) {
                    continue;
                }
                let path = assets_dir.join(rel);
                let texture = load_texture(&path.to_string_lossy())
                    .await
                    .map_err(|e| format!("failed to load {}: {e}", path.display()))?;
                textures.insert(rel.clone(), texture);
            }
        }
        Ok(Self { textures })
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    fn texture_for(&self, set: &StimulusSet, key: &str) -> Option<&Texture2D> {
        self.textures.get(set.assets.get(key)?)
    }
}

pub fn draw_text_centered(text: &str, cx: f32, cy: f32, font_size: u16, color: Color) {
    let dims = measure_text(text, None, font_size, 1.0);
    draw_text(
        text,
        cx - dims.width * 0.5,
        cy - dims.height * 0.5 + dims.offset_y,
        font_size as f32,
        color,
    );
}

fn draw_image_centered(texture: &Texture2D, cx: f32, cy: f32, size: f32) {
    draw_texture_ex(
        texture,
        cx - size * 0.5,
        cy - size * 0.5,
        WHITE,
        DrawTextureParams {
            dest_size: Some(vec2(size, size)),
            ..Default::default()
        },
    );
}

// Image slot with a text fallback; startup loading makes the fallback
// unreachable for validated configs.
fn draw_key(store: &AssetStore, set: &StimulusSet, key: &str, cx: f32, cy: f32, size: f32) {
    match store.texture_for(set, key) {
        Some(texture) => draw_image_centered(texture, cx, cy, size),
        None => draw_text_centered(key, cx, cy, STIM_FONT, INK),
    }
}

/// Thumbnail used on instruction screens.
pub fn draw_thumb(store: &AssetStore, set: &StimulusSet, key: &str, cx: f32, cy: f32) {
    draw_key(store, set, key, cx, cy, THUMB_SIZE);
}

/// One stimulus frame: flanker, target, flanker around the screen center.
pub fn draw_stimulus(spec: &TrialSpec, set: &StimulusSet, store: &AssetStore, cx: f32, cy: f32) {
    match spec.mode {
        RenderMode::Text => {
            let line = format!("{0}   {1}   {0}", spec.flanker, spec.target);
            draw_text_centered(&line, cx, cy, STIM_FONT, INK);
        }
        RenderMode::Image => {
            for (i, key) in [&spec.flanker, &spec.target, &spec.flanker]
                .into_iter()
                .enumerate()
            {
                let x = cx + (i as f32 - 1.0) * STIM_SPACING;
                draw_key(store, set, key, x, cy, STIM_SIZE);
            }
        }
        RenderMode::Mixed => {
            draw_key(store, set, &spec.target, cx, cy, STIM_SIZE);
            draw_text_centered(&spec.flanker, cx - STIM_SPACING, cy, MIXED_LETTER_FONT, INK);
            draw_text_centered(&spec.flanker, cx + STIM_SPACING, cy, MIXED_LETTER_FONT, INK);
        }
    }
}

pub fn draw_fixation(cx: f32, cy: f32) {
    draw_text_centered("+", cx, cy, FIXATION_FONT, INK);
}

pub fn draw_marker(spot: CheckSpec) {
    draw_circle(spot.x, spot.y, spot.radius, RED);
}

/// Question screen of the decoupled timing model.
pub fn draw_prompt(cx: f32, cy: f32) {
    draw_text_centered("LEFT or RIGHT?", cx, cy, STIM_FONT, INK);
}
