/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// Values that round to zero never carry a minus sign, so a baseline-corrected
/// `-0.0004` prints as `0.00`.
///
/// # Examples
///
/// ```
/// use power_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// assert_eq!(format_number(-0.0004, 2), "0.00");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut out = group_thousands(int_part);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }

    let is_zero = fixed.chars().all(|c| c == '0' || c == '.');
    if value < 0.0 && !is_zero {
        format!("-{}", out)
    } else {
        out
    }
}

/// Format a power value in watts, e.g. `"12.35 W"`.
pub fn format_watts(watts: f64) -> String {
    format!("{} W", format_number(watts, 2))
}

/// Format an energy total the way the session summary lines print it:
/// joules with two decimals, Wh with four and kWh with six.
///
/// ```
/// use power_core::formatting::format_energy;
///
/// assert_eq!(format_energy(7_200.0), "7,200.00 J, 2.0000 Wh, 0.002000 kWh");
/// ```
pub fn format_energy(joules: f64) -> String {
    format!(
        "{} J, {} Wh, {} kWh",
        format_number(joules, 2),
        format_number(joules / 3_600.0, 4),
        format_number(joules / 3_600_000.0, 6)
    )
}

/// `part / whole × 100`, defined as exactly `0.0` when `whole` is zero.
///
/// No rounding is applied; this feeds averaging, not display.
pub fn percent_of(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        return 0.0;
    }
    part / whole * 100.0
}

/// Format a percentage with two decimals and a `%` suffix.
pub fn format_percent(value: f64) -> String {
    format!("{}%", format_number(value, 2))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

// ── Tests ──────────────────────────────────────────────────────────────────────
