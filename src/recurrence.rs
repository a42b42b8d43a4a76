// SPDX-License-Identifier: MIT
//! Recurrence rule codec.
//!
//! Tasks persist their repeat schedule as a compact rule string:
//!
//! ```text
//! FREQ=<DAILY|WEEKLY|MONTHLY|YEARLY>[;INTERVAL=<n>][;BYDAY=<MO,WE,...>]
//! ```
//!
//! `encode` turns the editable form state into that string; `decode` turns a
//! stored string back into form state when the edit dialog reopens. Both are
//! pure and stateless, and neither ever fails: a corrupted stored rule must
//! not break the form, so malformed input always decodes to the safe default
//! rather than signaling an error.
//!
//! Known limitation, preserved on purpose: decoding a YEARLY rule ignores
//! any `INTERVAL` component and leaves the interval at "1". Stored yearly
//! rules with a larger interval lose it on the edit round trip.

use std::fmt;

// ─── Frequencies and weekdays ─────────────────────────────────────────────────

/// Recurrence frequency. Decode checks these in declaration order —
/// DAILY first — and the first keyword found in the rule string wins,
/// which is how a malformed multi-frequency string resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Daily,
        Frequency::Weekly,
        Frequency::Monthly,
        Frequency::Yearly,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Yearly => "YEARLY",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Two-letter weekday codes used in `BYDAY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Mo,
    Tu,
    We,
    Th,
    Fr,
    Sa,
    Su,
}

impl Weekday {
    pub fn code(&self) -> &'static str {
        match self {
            Weekday::Mo => "MO",
            Weekday::Tu => "TU",
            Weekday::We => "WE",
            Weekday::Th => "TH",
            Weekday::Fr => "FR",
            Weekday::Sa => "SA",
            Weekday::Su => "SU",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MO" => Some(Weekday::Mo),
            "TU" => Some(Weekday::Tu),
            "WE" => Some(Weekday::We),
            "TH" => Some(Weekday::Th),
            "FR" => Some(Weekday::Fr),
            "SA" => Some(Weekday::Sa),
            "SU" => Some(Weekday::Su),
            _ => None,
        }
    }
}

// ─── Form state ───────────────────────────────────────────────────────────────

/// The decoded, editable counterpart of a rule string. `frequency` of `None`
/// means "no recurrence". The interval stays string-typed because it mirrors
/// a free-text form field; `encode` is where it gets coerced to a number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceForm {
    pub frequency: Option<Frequency>,
    pub interval: String,
    /// Selected weekdays, in user insertion order — not canonical weekday
    /// order. Meaningful only for WEEKLY.
    pub weekdays: Vec<Weekday>,
}

impl Default for RecurrenceForm {
    fn default() -> Self {
        Self {
            frequency: None,
            interval: "1".to_string(),
            weekdays: Vec::new(),
        }
    }
}

// ─── Encode ───────────────────────────────────────────────────────────────────

/// Build the rule string for a form, or `None` when no recurrence is set.
///
/// The interval field is free text; anything that does not parse as a
/// positive integer is silently coerced to 1. Components are emitted in
/// fixed order (`FREQ`, `INTERVAL`, then `BYDAY` for WEEKLY with at least
/// one weekday selected) and joined with `;`, no trailing separator.
pub fn encode(form: &RecurrenceForm) -> Option<String> {
    let frequency = form.frequency?;

    let interval = form
        .interval
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|&n| n > 0)
        .unwrap_or(1);

    let mut parts = vec![format!("FREQ={frequency}"), format!("INTERVAL={interval}")];

    if frequency == Frequency::Weekly && !form.weekdays.is_empty() {
        let codes: Vec<&str> = form.weekdays.iter().map(Weekday::code).collect();
        parts.push(format!("BYDAY={}", codes.join(",")));
    }

    Some(parts.join(";"))
}

// ─── Decode ───────────────────────────────────────────────────────────────────

/// Recover form state from a stored rule string.
///
/// Best-effort and infallible: absent, empty, or garbage input yields the
/// default form. The frequency is found by scanning for keywords in
/// priority order (DAILY, WEEKLY, MONTHLY, YEARLY — first match wins);
/// `INTERVAL` and `BYDAY` values come from the component parser. YEARLY
/// skips both extractions (see the module-level note).
pub fn decode(rule: Option<&str>) -> RecurrenceForm {
    let rule = match rule {
        Some(r) if !r.is_empty() => r,
        _ => return RecurrenceForm::default(),
    };

    let frequency = match Frequency::ALL.iter().find(|f| rule.contains(f.keyword())) {
        Some(f) => *f,
        None => return RecurrenceForm::default(),
    };

    let mut form = RecurrenceForm {
        frequency: Some(frequency),
        ..RecurrenceForm::default()
    };

    if frequency == Frequency::Yearly {
        return form;
    }

    for (key, value) in components(rule) {
        match key {
            "INTERVAL" => {
                if let Some(interval) = leading_digits(value) {
                    form.interval = interval.to_string();
                }
            }
            "BYDAY" if frequency == Frequency::Weekly => {
                form.weekdays = value
                    .split(',')
                    .filter_map(Weekday::from_code)
                    .collect();
            }
            _ => {}
        }
    }

    form
}

/// Split a rule string into `(key, value)` components: `;`-separated, each
/// split on the first `=`. Components without an `=` are skipped.
fn components(rule: &str) -> impl Iterator<Item = (&str, &str)> + '_ {
    rule.split(';').filter_map(|part| part.split_once('='))
}

/// The leading ASCII digit run of a value, or `None` if it starts with a
/// non-digit.
fn leading_digits(value: &str) -> Option<&str> {
    let end = value.find(|c: char| !c.is_ascii_digit()).unwrap_or(value.len());
    (end > 0).then(|| &value[..end])
}
