use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::Vec3;

fn stable_hash<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Deterministic unit vector for an id, used to seed positions.
pub fn stable_direction(id: &str) -> Vec3 {
    let hash = stable_hash(id);
    let component = |shift: u32| {
        let bits = (hash >> shift) & 0x1f_ffff;
        ((bits as f64 / 0x1f_ffff as f64) as f32 * 2.0) - 1.0
    };

    let direction = Vec3::new(component(0), component(21), component(42));
    if direction.length_squared() <= 0.0001 {
        fallback_direction(hash as usize, 0)
    } else {
        direction.normalize()
    }
}

/// Direction used to separate two coincident points. Spread over the sphere
/// by golden-ratio steps so pairs never share an axis.
pub fn fallback_direction(a: usize, b: usize) -> Vec3 {
    let t = ((a as f32) * 0.618_034 + (b as f32) * 0.414_214).fract();
    let z = 1.0 - 2.0 * t;
    let ring = (1.0 - z * z).max(0.0).sqrt();
    let angle = ((a as f32) * 0.754_877 + (b as f32) * 0.569_840 + 0.37) * std::f32::consts::TAU;
    Vec3::new(ring * angle.cos(), ring * angle.sin(), z)
}

/// Stable phase in `[0, 1)` for decorative animations.
pub fn stable_phase(key: impl Hash) -> f32 {
    ((stable_hash(&key) & 0xffff) as f32) / 65_536.0
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_owned();
    }
    let mut truncated = label.chars().take(max_chars.saturating_sub(1)).collect::<String>();
    truncated.push('…');
    truncated
}
