//! Temporal normalization for dictated date/time fragments.
//!
//! Turns loose expressions ("demain", "15 mars", "14h30", "pour 45 minutes")
//! into absolute timestamps relative to a caller-supplied reference instant.
//! The normalizer is pure: the same `(fragment, reference_now)` pair always
//! yields the same output, and unresolved fragments produce warnings instead
//! of errors.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::canonicalize;

/// Fallback appointment length when the dictation carries no end and no
/// duration. Overridable through `TemporalConfig`.
pub const DEFAULT_DURATION_MINUTES: i64 = 30;

/// Hour used when a date is dictated without any time of day.
const DEFAULT_START_HOUR: u32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Fr,
    En,
}

impl Locale {
    /// Lenient tag parsing; anything that is not English falls back to French,
    /// the product's primary dictation language.
    pub fn from_tag(tag: &str) -> Self {
        if tag.trim().eq_ignore_ascii_case("en") {
            Locale::En
        } else {
            Locale::Fr
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeResolution {
    pub start: Option<DateTime<Utc>>,
    pub stop: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub warnings: Vec<String>,
}

static RE_ISO_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b").unwrap());
static RE_SLASH_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());
static RE_SLASH_DM: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})\b").unwrap());
static RE_DAY_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:er)?\s+([a-z]+)(?:\s+(\d{4}))?\b").unwrap());
static RE_TIME_24: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?:h(\d{2})?|:(\d{2}))\b").unwrap());
static RE_TIME_AMPM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})(?::(\d{2}))?\s*(am|pm)\b").unwrap());
static RE_TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:de |from |entre |between )?(\d{1,2})(?:h(\d{2})?|:(\d{2}))\s*(?:-|a|to|et|and|jusqu'a)\s*(\d{1,2})(?:h(\d{2})?|:(\d{2}))\b",
    )
    .unwrap()
});
static RE_DURATION_HOUR_MIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:pour|pendant|durant|for|during)\s+(\d{1,2})h(\d{2})\b").unwrap()
});
static RE_DURATION_MARKED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:pour|pendant|durant|for|during)\s+(\d{1,3})\s*(minutes?|min|mn|heures?|hours?|hrs?|h)\b")
        .unwrap()
});
static RE_DURATION_BARE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,3})\s*(minutes?|min|mn)\b").unwrap());
static RE_RELATIVE_IN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:dans|in)\s+(\d{1,3})\s*(minutes?|min|mn|heures?|hours?|hrs?|h)\b").unwrap()
});

const MONTHS_FR: [(&str, u32); 12] = [
    ("janvier", 1),
    ("fevrier", 2),
    ("mars", 3),
    ("avril", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("aout", 8),
    ("septembre", 9),
    ("octobre", 10),
    ("novembre", 11),
    ("decembre", 12),
];

const MONTHS_EN: [(&str, u32); 12] = [
    ("january", 1),
    ("february", 2),
    ("march", 3),
    ("april", 4),
    ("may", 5),
    ("june", 6),
    ("july", 7),
    ("august", 8),
    ("september", 9),
    ("october", 10),
    ("november", 11),
    ("december", 12),
];

const WEEKDAYS_FR: [(&str, u32); 7] = [
    ("lundi", 1),
    ("mardi", 2),
    ("mercredi", 3),
    ("jeudi", 4),
    ("vendredi", 5),
    ("samedi", 6),
    ("dimanche", 7),
];

const WEEKDAYS_EN: [(&str, u32); 7] = [
    ("monday", 1),
    ("tuesday", 2),
    ("wednesday", 3),
    ("thursday", 4),
    ("friday", 5),
    ("saturday", 6),
    ("sunday", 7),
];

/// Normalize a fragment with the built-in default duration.
pub fn normalize(fragment: &str, reference_now: DateTime<Utc>, locale: Locale) -> TimeResolution {
    normalize_with(fragment, reference_now, locale, DEFAULT_DURATION_MINUTES)
}

/// Normalize a fragment, applying `default_duration_minutes` when only a
/// start could be resolved.
pub fn normalize_with(
    fragment: &str,
    reference_now: DateTime<Utc>,
    locale: Locale,
    default_duration_minutes: i64,
) -> TimeResolution {
    let mut out = TimeResolution::default();
    let mut text = canonicalize(fragment);

    if text.is_empty() {
        out.warnings.push("fragment temporel vide".to_string());
        return out;
    }

    // "dans 30 minutes" / "in 2 hours" anchor directly on the reference
    // instant; checked before duration extraction which would otherwise
    // swallow the amount.
    if let Some(caps) = RE_RELATIVE_IN.captures(&text) {
        if let Ok(value) = caps[1].parse::<i64>() {
            let offset = if caps[2].starts_with('h') { value * 60 } else { value };
            let start = truncate_to_minute(reference_now + Duration::minutes(offset));
            out.start = Some(start);
            out.stop = Some(start + Duration::minutes(default_duration_minutes));
            out.duration_minutes = Some(default_duration_minutes);
            return out;
        }
    }

    // Durations are cut out of the working text first so "pour 1h30" cannot
    // be re-read as the time of day 1:30.
    let duration = extract_duration(&mut text);
    let range = extract_time_range(&mut text, &mut out.warnings);
    let time = match range {
        Some((start_hm, _)) => Some(start_hm),
        None => extract_time(&text, &mut out.warnings),
    };
    let date = extract_date(&text, reference_now, locale, &mut out.warnings);

    let start_date = match (date, time) {
        (Some(d), _) => Some(d),
        // Time without a date resolves to its nearest future occurrence.
        (None, Some((h, m))) => {
            let today = reference_now.date_naive();
            let candidate = at(today, h, m);
            if candidate.map(|c| c >= reference_now).unwrap_or(false) {
                Some(today)
            } else {
                today.succ_opt()
            }
        }
        (None, None) => None,
    };

    let Some(start_date) = start_date else {
        out.warnings.push(format!("aucune date ni heure reconnue dans \"{}\"", fragment.trim()));
        out.duration_minutes = duration;
        return out;
    };

    let (start_h, start_m) = match time {
        Some(hm) => hm,
        None => {
            out.warnings
                .push(format!("heure absente, {:02}:00 par defaut", DEFAULT_START_HOUR));
            (DEFAULT_START_HOUR, 0)
        }
    };

    let Some(start) = at(start_date, start_h, start_m) else {
        out.warnings.push(format!("heure invalide {:02}:{:02}", start_h, start_m));
        out.duration_minutes = duration;
        return out;
    };
    out.start = Some(start);

    if let Some((_, (stop_h, stop_m))) = range {
        // Explicit end wins over any duration. An end at or before the start
        // is read as crossing midnight.
        if let Some(mut stop) = at(start_date, stop_h, stop_m) {
            if stop <= start {
                stop += Duration::days(1);
            }
            out.stop = Some(stop);
            out.duration_minutes = Some((stop - start).num_minutes());
            return out;
        }
        out.warnings.push(format!("heure de fin invalide {:02}:{:02}", stop_h, stop_m));
    }

    // A zero-length dictation ("pour 0 minutes") falls back to the default
    // so the stop always lands strictly after the start.
    let minutes = duration.filter(|m| *m > 0).unwrap_or(default_duration_minutes);
    out.stop = Some(start + Duration::minutes(minutes));
    out.duration_minutes = Some(minutes);
    out
}

fn at(date: NaiveDate, hour: u32, minute: u32) -> Option<DateTime<Utc>> {
    date.and_hms_opt(hour, minute, 0).map(|dt| Utc.from_utc_datetime(&dt))
}

fn truncate_to_minute(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_second(0).and_then(|d| d.with_nanosecond(0)).unwrap_or(dt)
}

/// Find an explicit duration and blank its span out of `text`.
fn extract_duration(text: &mut String) -> Option<i64> {
    if let Some(caps) = RE_DURATION_HOUR_MIN.captures(text) {
        let hours: i64 = caps[1].parse().ok()?;
        let minutes: i64 = caps[2].parse().ok()?;
        let span = caps.get(0).unwrap().range();
        blank(text, span);
        return Some(hours * 60 + minutes);
    }

    if let Some(caps) = RE_DURATION_MARKED.captures(text) {
        let value: i64 = caps[1].parse().ok()?;
        let in_hours = caps[2].starts_with('h');
        let span = caps.get(0).unwrap().range();
        blank(text, span);
        return Some(if in_hours { value * 60 } else { value });
    }

    if let Some(caps) = RE_DURATION_BARE.captures(text) {
        let value: i64 = caps[1].parse().ok()?;
        let span = caps.get(0).unwrap().range();
        blank(text, span);
        return Some(value);
    }

    None
}

fn blank(text: &mut String, range: std::ops::Range<usize>) {
    let replacement = " ".repeat(range.len());
    text.replace_range(range, &replacement);
}

fn extract_time_range(
    text: &mut String,
    warnings: &mut Vec<String>,
) -> Option<((u32, u32), (u32, u32))> {
    let caps = RE_TIME_RANGE.captures(text)?;
    let start = hm_from(&caps, 1, 2, 3, warnings)?;
    let stop = hm_from(&caps, 4, 5, 6, warnings)?;
    let span = caps.get(0).unwrap().range();
    blank(text, span);
    Some((start, stop))
}

fn hm_from(
    caps: &regex::Captures<'_>,
    hour_idx: usize,
    h_min_idx: usize,
    colon_min_idx: usize,
    warnings: &mut Vec<String>,
) -> Option<(u32, u32)> {
    let hour: u32 = caps.get(hour_idx)?.as_str().parse().ok()?;
    let minute: u32 = caps
        .get(h_min_idx)
        .or_else(|| caps.get(colon_min_idx))
        .map_or(Ok(0), |m| m.as_str().parse())
        .ok()?;
    if hour > 23 || minute > 59 {
        warnings.push(format!("heure invalide {:02}:{:02}", hour, minute));
        return None;
    }
    Some((hour, minute))
}

fn extract_time(text: &str, warnings: &mut Vec<String>) -> Option<(u32, u32)> {
    // Noon and midnight are dictated as words in both locales.
    for (word, hm) in
        [("midi", (12, 0)), ("minuit", (0, 0)), ("noon", (12, 0)), ("midnight", (0, 0))]
    {
        if word_present(text, word) {
            return Some(hm);
        }
    }

    // am/pm first so "2:30pm" is not read as 02:30 by the 24-hour form.
    if let Some(caps) = RE_TIME_AMPM.captures(text) {
        let hour: u32 = caps[1].parse().ok()?;
        let minute: u32 = caps.get(2).map_or(Ok(0), |m| m.as_str().parse()).ok()?;
        let meridiem = caps.get(3).map_or("", |m| m.as_str());
        let hour_24 = match (hour, meridiem) {
            (12, "am") => 0,
            (h, "am") => h,
            (12, "pm") => 12,
            (h, "pm") => h + 12,
            _ => hour,
        };
        if hour_24 > 23 || minute > 59 {
            warnings.push(format!("heure invalide {:02}:{:02}", hour_24, minute));
            return None;
        }
        return Some((hour_24, minute));
    }

    if let Some(caps) = RE_TIME_24.captures(text) {
        return hm_from(&caps, 1, 2, 3, warnings);
    }

    None
}

fn word_present(text: &str, word: &str) -> bool {
    text.split(|c: char| !c.is_alphanumeric() && c != '-' && c != '\'')
        .any(|token| token == word)
}

fn extract_date(
    text: &str,
    reference_now: DateTime<Utc>,
    locale: Locale,
    warnings: &mut Vec<String>,
) -> Option<NaiveDate> {
    let today = reference_now.date_naive();

    if let Some(caps) = RE_ISO_DATE.captures(text) {
        return ymd(&caps[1], &caps[2], &caps[3], warnings);
    }

    if let Some(caps) = RE_SLASH_DMY.captures(text) {
        return ymd(&caps[3], &caps[2], &caps[1], warnings);
    }

    let (months, weekdays, relatives): (&[(&str, u32)], &[(&str, u32)], &[(&str, i64)]) =
        match locale {
            Locale::Fr => (
                &MONTHS_FR,
                &WEEKDAYS_FR,
                &[("apres-demain", 2), ("demain", 1), ("aujourd'hui", 0)],
            ),
            Locale::En => (
                &MONTHS_EN,
                &WEEKDAYS_EN,
                &[("day after tomorrow", 2), ("tomorrow", 1), ("today", 0)],
            ),
        };

    // "15 mars", "1er avril 2026" — a missing year resolves to the nearest
    // future occurrence.
    for caps in RE_DAY_MONTH.captures_iter(text) {
        let month_word = &caps[2];
        let Some(&(_, month)) = months.iter().find(|(name, _)| *name == month_word) else {
            continue;
        };
        let day: u32 = match caps[1].parse() {
            Ok(d) => d,
            Err(_) => continue,
        };
        if let Some(year_match) = caps.get(3) {
            let year: i32 = year_match.as_str().parse().ok()?;
            return checked_date(year, month, day, warnings);
        }
        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
        return match this_year {
            Some(d) if d >= today => Some(d),
            _ => checked_date(today.year() + 1, month, day, warnings),
        };
    }

    for (word, offset) in relatives {
        if text.contains(word) {
            return today.checked_add_signed(Duration::days(*offset));
        }
    }

    // A bare weekday means the coming occurrence; with "prochain"/"next" the
    // one after, matching how the dictations are phrased.
    for (word, target) in weekdays {
        if !word_present(text, word) {
            continue;
        }
        let current = today.weekday().num_days_from_monday() as i64 + 1;
        let mut days_until = (*target as i64 - current + 7) % 7;
        if days_until == 0 {
            days_until = 7;
        }
        let is_next = match locale {
            Locale::Fr => text.contains(&format!("{} prochain", word)),
            Locale::En => text.contains(&format!("next {}", word)),
        };
        if is_next && days_until != 7 {
            days_until += 7;
        }
        return today.checked_add_signed(Duration::days(days_until));
    }

    // DD/MM without a year, checked last so DD/MM/YYYY is not shadowed.
    if let Some(caps) = RE_SLASH_DM.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month: u32 = caps[2].parse().ok()?;
        if month >= 1 && month <= 12 {
            let this_year = NaiveDate::from_ymd_opt(today.year(), month, day);
            return match this_year {
                Some(d) if d >= today => Some(d),
                _ => checked_date(today.year() + 1, month, day, warnings),
            };
        }
        warnings.push(format!("date invalide {}/{}", day, month));
        return None;
    }

    None
}

fn ymd(year: &str, month: &str, day: &str, warnings: &mut Vec<String>) -> Option<NaiveDate> {
    let y: i32 = year.parse().ok()?;
    let m: u32 = month.parse().ok()?;
    let d: u32 = day.parse().ok()?;
    checked_date(y, m, d, warnings)
}

fn checked_date(year: i32, month: u32, day: u32, warnings: &mut Vec<String>) -> Option<NaiveDate> {
    let date = NaiveDate::from_ymd_opt(year, month, day);
    if date.is_none() {
        warnings.push(format!("date invalide {:04}-{:02}-{:02}", year, month, day));
    }
    date
}
