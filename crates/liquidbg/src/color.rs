//! CSS-style colour strings to normalised RGBA.

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColorError {
    #[error("unrecognised colour '{0}'")]
    Unrecognised(String),
    #[error("colour '{input}' has an invalid component '{component}'")]
    Component { input: String, component: String },
}

/// Parses `#rgb`, `#rgba`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()`,
/// `hsl()` and `hsla()` into `[r, g, b, a]` with every channel in `0..=1`.
pub fn parse_color(input: &str) -> Result<[f32; 4], ColorError> {
    let trimmed = input.trim();
    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).ok_or_else(|| ColorError::Unrecognised(trimmed.to_string()));
    }

    let lower = trimmed.to_ascii_lowercase();
    let (name, rest) = lower
        .split_once('(')
        .ok_or_else(|| ColorError::Unrecognised(trimmed.to_string()))?;
    let args = rest
        .strip_suffix(')')
        .ok_or_else(|| ColorError::Unrecognised(trimmed.to_string()))?;
    let parts: Vec<&str> = args
        .split(|ch: char| ch == ',' || ch == '/' || ch.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect();

    let component = |part: &str| ColorError::Component {
        input: trimmed.to_string(),
        component: part.to_string(),
    };

    let alpha = match parts.get(3) {
        Some(part) => parse_alpha(part).ok_or_else(|| component(part))?,
        None => 1.0,
    };
    if !(3..=4).contains(&parts.len()) {
        return Err(ColorError::Unrecognised(trimmed.to_string()));
    }

    match name.trim() {
        "rgb" | "rgba" => {
            let mut rgb = [0.0f32; 3];
            for (slot, part) in rgb.iter_mut().zip(&parts) {
                *slot = parse_rgb_channel(part).ok_or_else(|| component(part))?;
            }
            Ok([rgb[0], rgb[1], rgb[2], alpha])
        }
        "hsl" | "hsla" => {
            let hue = parse_hue(parts[0]).ok_or_else(|| component(parts[0]))?;
            let saturation = parse_percent(parts[1]).ok_or_else(|| component(parts[1]))?;
            let lightness = parse_percent(parts[2]).ok_or_else(|| component(parts[2]))?;
            let [r, g, b] = hsl_to_rgb(hue, saturation, lightness);
            Ok([r, g, b, alpha])
        }
        _ => Err(ColorError::Unrecognised(trimmed.to_string())),
    }
}

fn parse_hex(hex: &str) -> Option<[f32; 4]> {
    if !hex.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    let digits: Vec<u8> = match hex.len() {
        3 | 4 => hex
            .chars()
            .map(|ch| ch.to_digit(16).map(|value| (value * 17) as u8))
            .collect::<Option<_>>()?,
        6 | 8 => (0..hex.len())
            .step_by(2)
            .map(|start| u8::from_str_radix(&hex[start..start + 2], 16).ok())
            .collect::<Option<_>>()?,
        _ => return None,
    };
    let channel = |index: usize| digits.get(index).map_or(1.0, |value| *value as f32 / 255.0);
    Some([channel(0), channel(1), channel(2), channel(3)])
}

fn parse_number(part: &str) -> Option<f32> {
    part.parse::<f32>().ok().filter(|value| value.is_finite())
}

fn parse_rgb_channel(part: &str) -> Option<f32> {
    let value = match part.strip_suffix('%') {
        Some(percent) => parse_number(percent)? / 100.0,
        None => parse_number(part)? / 255.0,
    };
    Some(value.clamp(0.0, 1.0))
}

fn parse_alpha(part: &str) -> Option<f32> {
    let value = match part.strip_suffix('%') {
        Some(percent) => parse_number(percent)? / 100.0,
        None => parse_number(part)?,
    };
    Some(value.clamp(0.0, 1.0))
}

fn parse_percent(part: &str) -> Option<f32> {
    let value = parse_number(part.strip_suffix('%').unwrap_or(part))?;
    Some((value / 100.0).clamp(0.0, 1.0))
}

fn parse_hue(part: &str) -> Option<f32> {
    let degrees = parse_number(part.strip_suffix("deg").unwrap_or(part))?;
    Some(degrees.rem_euclid(360.0))
}

fn hsl_to_rgb(hue: f32, saturation: f32, lightness: f32) -> [f32; 3] {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector.rem_euclid(2.0) - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    [r + m, g + m, b + m]
}
