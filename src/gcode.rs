//! Extracts print metrics from the header comments PrusaSlicer writes
//! into its G-code output.

use anyhow::{Context, Result, bail};

use crate::slicer::SliceResult;

const FILAMENT_USED_MM: &str = "; filament used [mm] = ";
const FILAMENT_USED_G: &str = "; total filament used [g] = ";
const PRINT_TIME: &str = "; estimated printing time (normal mode) = ";

/// Scan G-code text for the filament and print-time comments.
///
/// Unrecognized lines are skipped and a repeated comment overwrites the
/// earlier value. The result is marked successful even if none of the
/// comments were present. A recognized comment with an unparseable value
/// is an error.
pub fn parse_slice_info(gcode: &str) -> Result<SliceResult> {
    let mut info = SliceResult {
        slicing_ok: true,
        ..SliceResult::default()
    };

    for (index, line) in gcode.split('\n').enumerate() {
        let line_no = index + 1;
        if let Some(value) = line.strip_prefix(FILAMENT_USED_MM) {
            info.filament_used_mm = parse_amount(value)
                .with_context(|| format!("line {}: bad filament length", line_no))?;
        } else if let Some(value) = line.strip_prefix(FILAMENT_USED_G) {
            info.filament_used_g = parse_amount(value)
                .with_context(|| format!("line {}: bad filament weight", line_no))?;
        } else if let Some(value) = line.strip_prefix(PRINT_TIME) {
            info.print_time_sec = parse_print_time(value)
                .with_context(|| format!("line {}: bad print time", line_no))?;
        }
    }

    Ok(info)
}

fn parse_amount(value: &str) -> Result<f64> {
    let value = value.trim();
    let amount: f64 = value
        .parse()
        .with_context(|| format!("not a number: {:?}", value))?;
    if !amount.is_finite() || amount < 0.0 {
        bail!("out of range: {:?}", value);
    }
    Ok(amount)
}

/// Parse `<minutes>m <seconds>s` into whole seconds.
fn parse_print_time(value: &str) -> Result<u64> {
    let mut parts = value.split_whitespace();
    let (Some(minutes), Some(seconds), None) = (parts.next(), parts.next(), parts.next()) else {
        bail!("expected \"<minutes>m <seconds>s\", got {:?}", value.trim());
    };

    let minutes = time_component(minutes, 'm', 59)?;
    let seconds = time_component(seconds, 's', 61)?;
    Ok(minutes * 60 + seconds)
}

fn time_component(part: &str, unit: char, max: u64) -> Result<u64> {
    let digits = part
        .strip_suffix(unit)
        .with_context(|| format!("{:?} is missing its '{}' unit", part, unit))?;
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        bail!("{:?} is not a one or two digit count", part);
    }
    let n: u64 = digits.parse()?;
    if n > max {
        bail!("{:?} exceeds {}{}", part, max, unit);
    }
    Ok(n)
}
