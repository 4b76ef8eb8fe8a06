// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

const SUBSCRIPT_DIGITS: [char; 10] = ['₀', '₁', '₂', '₃', '₄', '₅', '₆', '₇', '₈', '₉'];

/// Formats [n] with subscript digits. Used for bit widths and clone depths.
pub fn subscript(n: u64) -> String {
    n.to_string()
        .chars()
        .map(|c| match c.to_digit(10) {
            Some(d) => SUBSCRIPT_DIGITS[d as usize],
            None => c,
        })
        .collect()
}

/// Formats a signed offset as hex with explicit sign. E.g. `-0x8` or `+0x10`.
pub fn signed_hex(n: i64) -> String {
    if n < 0 {
        format!("-{:#x}", n.unsigned_abs())
    } else {
        format!("+{:#x}", n)
    }
}

/// Parses a hex number with or without `0x` prefix.
pub fn parse_hex(s: &str) -> Option<u64> {
    let t = s.trim();
    let digits = t
        .strip_prefix("0x")
        .or_else(|| t.strip_prefix("0X"))
        .unwrap_or(t);
    u64::from_str_radix(digits, 16).ok()
}
