//! Opening-hours mini-language: parsing and evaluation.
//!
//! Supported grammar (a small subset of OSM `opening_hours`):
//!
//! ```text
//! spec      := fragment (';' fragment)*
//! fragment  := [day_spec ' '+] time_range <ignored trailing text>
//! day_spec  := segment (',' segment)*
//! segment   := token | token '-' token
//! token     := [A-Za-z0-9]+
//! day       := "Mo" | "Tu" | "We" | "Th" | "Fr" | "Sa" | "Su"
//! time_range:= time '-' time
//! time      := H[H] ':' MM
//! ```
//!
//! Any spec containing `24/7`, `24h` or `open 24` (case-insensitive) is
//! unconditionally open. Fragments that do not parse are inert.
//!
//! A segment contributes days only when its tokens are day codes; other
//! tokens such as `PH` are skipped. A day spec with no day codes at all
//! (`Mon-Fri`) makes its fragment inert.
//!
//! Evaluation walks the fragments in order. Fragments whose day set excludes
//! today are skipped; the first fragment that applies today decides the
//! verdict by its time window alone. If none applies, the status is unknown.

use chrono::{DateTime, Datelike, Timelike};
use chrono_tz::Tz;

use crate::facility::OpenStatus;

const WEEKDAY_CODES: [&str; 7] = ["Mo", "Tu", "We", "Th", "Fr", "Sa", "Su"];

const ALWAYS_OPEN_MARKERS: [&str; 3] = ["24/7", "24h", "open 24"];

/// Subset of weekdays, Monday = 0 .. Sunday = 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DaySet(u8);

impl DaySet {
    pub fn insert(&mut self, day: u8) {
        debug_assert!(day < 7);
        self.0 |= 1 << day;
    }

    /// Insert `from..=to`, wrapping past Sunday when `from > to`.
    pub fn insert_range(&mut self, from: u8, to: u8) {
        let mut day = from;
        loop {
            self.insert(day);
            if day == to {
                break;
            }
            day = (day + 1) % 7;
        }
    }

    pub fn contains(&self, day: u8) -> bool {
        day < 7 && self.0 & (1 << day) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Days in the set, Monday first.
    pub fn days(&self) -> Vec<u8> {
        (0..7).filter(|d| self.contains(*d)).collect()
    }
}

/// A daily window in minutes-of-day. `end < start` crosses midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: u32,
    pub end: u32,
}

impl TimeWindow {
    /// Half-open membership test: `[start, end)`, wrapping when `end < start`.
    pub fn contains(&self, minute: u32) -> bool {
        if self.start <= self.end {
            self.start <= minute && minute < self.end
        } else {
            minute >= self.start || minute < self.end
        }
    }
}

/// One parsed fragment. `days == None` applies every day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHoursRule {
    pub days: Option<DaySet>,
    pub window: TimeWindow,
}

impl OpeningHoursRule {
    pub fn applies_on(&self, weekday: u8) -> bool {
        self.days.map_or(true, |d| d.contains(weekday))
    }
}

/// A parsed opening-hours spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpeningHours {
    AlwaysOpen,
    /// Parsed fragments in source order; unparsable fragments are dropped.
    Rules(Vec<OpeningHoursRule>),
}

impl OpeningHours {
    /// Parse a raw spec. Never fails.
    pub fn parse(raw: &str) -> Self {
        let spec = normalize_spec(raw);
        let lower = spec.to_lowercase();
        if ALWAYS_OPEN_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::AlwaysOpen;
        }

        let rules = spec
            .split(';')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .filter_map(parse_fragment)
            .collect();
        Self::Rules(rules)
    }

    /// Status on `weekday` (Monday = 0) at `minute` past midnight.
    pub fn status_at(&self, weekday: u8, minute: u32) -> OpenStatus {
        let rules = match self {
            Self::AlwaysOpen => return OpenStatus::Open,
            Self::Rules(rules) => rules,
        };

        // First applicable rule wins; later rules are never consulted.
        match rules.iter().find(|r| r.applies_on(weekday)) {
            Some(rule) if rule.window.contains(minute) => OpenStatus::Open,
            Some(_) => OpenStatus::Closed,
            None => OpenStatus::Unknown,
        }
    }
}

/// Evaluate an optional spec at a timezone-aware instant.
pub fn evaluate(spec: Option<&str>, at: &DateTime<Tz>) -> OpenStatus {
    let Some(spec) = spec.filter(|s| !s.trim().is_empty()) else {
        return OpenStatus::Unknown;
    };
    let weekday = at.weekday().num_days_from_monday() as u8;
    let minute = at.hour() * 60 + at.minute();
    OpeningHours::parse(spec).status_at(weekday, minute)
}

/// Trim, fold dash variants to ASCII `-`, and collapse whitespace.
fn normalize_spec(raw: &str) -> String {
    raw.chars()
        .map(|c| match c {
            '\u{2212}' | '\u{2013}' | '\u{2014}' => '-',
            '\u{00A0}' => ' ',
            c => c,
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_fragment(fragment: &str) -> Option<OpeningHoursRule> {
    let mut p = Parser::new(fragment);
    if let Some(window) = p.time_range() {
        return Some(OpeningHoursRule { days: None, window });
    }

    p.reset();
    let days = p.day_spec()?;
    if days.is_empty() || !p.spaces() {
        return None;
    }
    let window = p.time_range()?;
    Some(OpeningHoursRule { days: Some(days), window })
}

fn weekday(code: &[u8]) -> Option<u8> {
    WEEKDAY_CODES
        .iter()
        .position(|c| c.as_bytes() == code)
        .map(|idx| idx as u8)
}

/// Byte cursor over one fragment. Every method either consumes a complete
/// production and returns `Some`, or returns `None`; callers reset on failure.
struct Parser<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0 }
    }

    fn reset(&mut self) {
        self.pos = 0;
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.peek() == Some(b) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Skip spaces; true if at least one was consumed.
    fn spaces(&mut self) -> bool {
        let start = self.pos;
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
        self.pos > start
    }

    /// Between `min` and `max` ASCII digits.
    fn digits(&mut self, min: usize, max: usize) -> Option<u32> {
        let start = self.pos;
        let mut value = 0u32;
        while self.pos - start < max {
            match self.peek() {
                Some(b) if b.is_ascii_digit() => {
                    value = value * 10 + u32::from(b - b'0');
                    self.pos += 1;
                }
                _ => break,
            }
        }
        (self.pos - start >= min).then_some(value)
    }

    fn time(&mut self) -> Option<u32> {
        let hours = self.digits(1, 2)?;
        if !self.eat(b':') {
            return None;
        }
        let minutes = self.digits(2, 2)?;
        Some(hours * 60 + minutes)
    }

    fn time_range(&mut self) -> Option<TimeWindow> {
        let start = self.time()?;
        self.spaces();
        if !self.eat(b'-') {
            return None;
        }
        self.spaces();
        let end = self.time()?;
        Some(TimeWindow { start, end })
    }

    /// A run of ASCII letters and digits.
    fn token(&mut self) -> Option<&'a [u8]> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b.is_ascii_alphanumeric()) {
            self.pos += 1;
        }
        let (src, end) = (self.src, self.pos);
        (end > start).then(|| &src[start..end])
    }

    /// Adds the segment's days to `set`; unknown tokens add nothing.
    fn day_segment(&mut self, set: &mut DaySet) -> Option<()> {
        let from = self.token()?;
        let save = self.pos;
        self.spaces();
        if self.eat(b'-') {
            self.spaces();
            let to = self.token()?;
            if let (Some(from), Some(to)) = (weekday(from), weekday(to)) {
                set.insert_range(from, to);
            }
        } else {
            self.pos = save;
            if let Some(day) = weekday(from) {
                set.insert(day);
            }
        }
        Some(())
    }

    fn day_spec(&mut self) -> Option<DaySet> {
        let mut set = DaySet::default();
        self.day_segment(&mut set)?;
        loop {
            let save = self.pos;
            self.spaces();
            if !self.eat(b',') {
                self.pos = save;
                break;
            }
            self.spaces();
            self.day_segment(&mut set)?;
        }
        Some(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Asia::Kolkata;

    // 2026-10-19 is a Monday.
    fn at(day_of_month: u32, hour: u32, minute: u32) -> DateTime<Tz> {
        Kolkata.with_ymd_and_hms(2026, 10, day_of_month, hour, minute, 0).unwrap()
    }

    const MON: u32 = 19;
    const TUE: u32 = 20;
    const WED: u32 = 21;
    const SAT: u32 = 24;
    const SUN: u32 = 25;

    #[test]
    fn test_always_open_markers() {
        for spec in ["24/7", "24H", "Open 24 hours", "Mo-Su 24h", "open 24/7 for emergencies"] {
            for (d, h) in [(MON, 0), (WED, 12), (SUN, 23)] {
                assert_eq!(evaluate(Some(spec), &at(d, h, 30)), OpenStatus::Open, "{}", spec);
            }
        }
    }

    #[test]
    fn test_overnight_window() {
        let spec = Some("22:00-06:00");
        assert_eq!(evaluate(spec, &at(TUE, 23, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(TUE, 2, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(TUE, 12, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_window_is_half_open() {
        let spec = Some("09:00-17:00");
        assert_eq!(evaluate(spec, &at(MON, 9, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(MON, 16, 59)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(MON, 17, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_wrapping_day_range() {
        let spec = Some("Fr-Mo 00:00-23:59");
        assert_eq!(evaluate(spec, &at(SAT, 10, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(MON, 10, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(WED, 10, 0)), OpenStatus::Unknown);
    }

    #[test]
    fn test_no_fragment_applies_is_unknown() {
        let spec = Some("Mo-Fr 09:00-18:00; Sa 10:00-14:00");
        assert_eq!(evaluate(spec, &at(SUN, 11, 0)), OpenStatus::Unknown);
        assert_eq!(evaluate(spec, &at(SAT, 11, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(SAT, 15, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_first_applicable_fragment_decides() {
        // The second fragment would say open, but the first one applies on
        // Tuesday and says closed at 19:00.
        let spec = Some("Mo-Fr 09:00-18:00; Tu 18:00-22:00");
        assert_eq!(evaluate(spec, &at(TUE, 19, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_empty_or_absent_is_unknown() {
        assert_eq!(evaluate(None, &at(MON, 10, 0)), OpenStatus::Unknown);
        assert_eq!(evaluate(Some(""), &at(MON, 10, 0)), OpenStatus::Unknown);
        assert_eq!(evaluate(Some("   ; ;"), &at(MON, 10, 0)), OpenStatus::Unknown);
    }

    #[test]
    fn test_unparsable_fragments_are_inert() {
        let spec = Some("PH off; by appointment; Mo 08:00-12:00");
        assert_eq!(evaluate(spec, &at(MON, 9, 0)), OpenStatus::Open);
        assert_eq!(evaluate(Some("sunrise-sunset"), &at(MON, 9, 0)), OpenStatus::Unknown);
    }

    #[test]
    fn test_dash_variants_and_spacing() {
        let spec = Some("Mo\u{2013}Fr\u{00A0}09:00 \u{2212} 18:00");
        assert_eq!(evaluate(spec, &at(WED, 10, 0)), OpenStatus::Open);
        let spec = Some("  Mo \u{2014} Fr   09:00-18:00  ");
        assert_eq!(evaluate(spec, &at(WED, 20, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_parse_day_list_and_ranges() {
        let parsed = OpeningHours::parse("Mo,We-Th, Sa 8:30-12:00");
        let OpeningHours::Rules(rules) = parsed else { panic!("expected rules") };
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].days.unwrap().days(), vec![0, 2, 3, 5]);
        assert_eq!(rules[0].window, TimeWindow { start: 510, end: 720 });
    }

    #[test]
    fn test_parse_keeps_order_and_drops_garbage() {
        let OpeningHours::Rules(rules) = OpeningHours::parse("Sa 10:00-14:00; closed; 09:00-18:00")
        else {
            panic!("expected rules")
        };
        assert_eq!(rules.len(), 2);
        assert!(rules[0].days.is_some());
        assert!(rules[1].days.is_none());
    }

    #[test]
    fn test_parse_requires_space_before_time() {
        assert_eq!(OpeningHours::parse("Mo09:00-12:00"), OpeningHours::Rules(vec![]));
        assert_eq!(OpeningHours::parse("Mon-Fri 09:00-12:00"), OpeningHours::Rules(vec![]));
    }

    #[test]
    fn test_unknown_day_tokens_are_skipped() {
        let spec = Some("Mo-Fr,PH 08:00-20:00");
        assert_eq!(evaluate(spec, &at(TUE, 10, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(TUE, 21, 0)), OpenStatus::Closed);
        assert_eq!(evaluate(spec, &at(SAT, 10, 0)), OpenStatus::Unknown);

        assert_eq!(OpeningHours::parse("Mo,PH 09:00-18:00").status_at(0, 600), OpenStatus::Open);
        assert_eq!(OpeningHours::parse("PH,Sa 09:00-13:00").status_at(5, 600), OpenStatus::Open);
        assert_eq!(OpeningHours::parse("PH 09:00-18:00"), OpeningHours::Rules(vec![]));
    }

    #[test]
    fn test_trailing_text_after_window_ignored() {
        let spec = Some("Mo-Fr 09:00-13:00,16:00-20:00");
        assert_eq!(evaluate(spec, &at(TUE, 10, 0)), OpenStatus::Open);
        assert_eq!(evaluate(spec, &at(TUE, 17, 0)), OpenStatus::Closed);
    }

    #[test]
    fn test_day_set_wrap() {
        let mut set = DaySet::default();
        set.insert_range(4, 0);
        assert_eq!(set.days(), vec![0, 4, 5, 6]);
        let mut single = DaySet::default();
        single.insert_range(2, 2);
        assert_eq!(single.days(), vec![2]);
        assert!(!DaySet::default().contains(3));
    }

    #[test]
    fn test_status_at_is_pure() {
        let hours = OpeningHours::parse("Mo-Fr 09:00-18:00");
        let first = hours.status_at(1, 600);
        for _ in 0..3 {
            assert_eq!(hours.status_at(1, 600), first);
        }
    }
}
