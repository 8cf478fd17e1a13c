use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Opening window for one day, wall-clock local time.
/// `close <= open` means the window runs past midnight into the next day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayWindow {
    pub open: NaiveTime,
    pub close: NaiveTime,
}

impl DayWindow {
    pub fn new(open: NaiveTime, close: NaiveTime) -> Self {
        DayWindow { open, close }
    }
}

/// Weekly opening hours indexed by weekday, Sunday (0) through Saturday (6).
/// `None` means closed all day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyHours {
    days: [Option<DayWindow>; 7],
}

impl WeeklyHours {
    /// Create a schedule with every day closed.
    pub fn closed() -> Self {
        WeeklyHours::default()
    }

    /// `day` 0–6 (Sun–Sat). Out-of-range days are ignored.
    pub fn set_day(&mut self, day: usize, window: DayWindow) {
        if let Some(slot) = self.days.get_mut(day) {
            *slot = Some(window);
        }
    }

    pub fn clear_day(&mut self, day: usize) {
        if let Some(slot) = self.days.get_mut(day) {
            *slot = None;
        }
    }

    pub fn day(&self, day: usize) -> Option<DayWindow> {
        self.days.get(day).copied().flatten()
    }

    /// Weekday index for a date, Sunday = 0.
    pub fn weekday_index(date: NaiveDate) -> usize {
        date.weekday().num_days_from_sunday() as usize
    }

    /// The opening window anchored on `date`, as concrete timestamps.
    /// A window crossing midnight closes on the following day.
    pub fn window_on(&self, date: NaiveDate) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let window = self.day(Self::weekday_index(date))?;
        let open = date.and_time(window.open);
        let close = if window.close <= window.open {
            (date + Duration::days(1)).and_time(window.close)
        } else {
            date.and_time(window.close)
        };
        Some((open, close))
    }

    /// The window containing `now`, if any. Checks both the window
    /// anchored today and yesterday's window running past midnight.
    pub fn window_containing(&self, now: NaiveDateTime) -> Option<(NaiveDateTime, NaiveDateTime)> {
        for anchor in [now.date(), now.date() - Duration::days(1)] {
            if let Some((open, close)) = self.window_on(anchor) {
                if now >= open && now < close {
                    return Some((open, close));
                }
            }
        }
        None
    }

    /// Earliest opening at or after `from`, scanning up to a week
    /// ahead. Today only counts while `from` is before the opening.
    pub fn next_open(&self, from: NaiveDateTime) -> Option<NaiveDateTime> {
        for offset in 0..=7 {
            let date = from.date() + Duration::days(offset);
            if let Some((open, _)) = self.window_on(date) {
                if open > from {
                    return Some(open);
                }
            }
        }
        None
    }

    /// Day name from index (0=Sunday).
    pub fn day_name(day: usize) -> &'static str {
        match day {
            0 => "Sunday",
            1 => "Monday",
            2 => "Tuesday",
            3 => "Wednesday",
            4 => "Thursday",
            5 => "Friday",
            6 => "Saturday",
            _ => "?",
        }
    }

    /// Short day name from index (0=Sun).
    pub fn day_name_short(day: usize) -> &'static str {
        match day {
            0 => "Sun",
            1 => "Mon",
            2 => "Tue",
            3 => "Wed",
            4 => "Thu",
            5 => "Fri",
            6 => "Sat",
            _ => "?",
        }
    }
}

/// Pickup slot policy: minimum preparation lead, booking horizon, and
/// slot granularity, all in minutes. `step_minutes` must be positive;
/// a non-positive step makes the slot grid empty and checkout closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickupConfig {
    pub lead_minutes: i64,
    pub horizon_minutes: i64,
    pub step_minutes: i64,
}

impl Default for PickupConfig {
    fn default() -> Self {
        PickupConfig {
            lead_minutes: 15,
            horizon_minutes: 120,
            step_minutes: 15,
        }
    }
}

/// What the storefront can offer right now: either a list of bookable
/// pickup slots, or closed with the next opening (if any this week).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Availability {
    pub slots: Vec<NaiveDateTime>,
    pub next_open: Option<NaiveDateTime>,
}

impl Availability {
    pub fn can_checkout(&self) -> bool {
        !self.slots.is_empty()
    }
}

/// Round `t` up to the next multiple of `step_minutes`, dropping
/// seconds first. A timestamp already on the grid is unchanged, and a
/// non-positive step leaves `t` as-is.
pub fn round_up_to_step(t: NaiveDateTime, step_minutes: i64) -> NaiveDateTime {
    let mut t = t
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(t);
    if step_minutes <= 0 {
        return t;
    }
    let rem = i64::from(t.minute()) % step_minutes;
    if rem != 0 {
        t += Duration::minutes(step_minutes - rem);
    }
    t
}

/// Compute bookable pickup slots for `now`.
///
/// The lower bound is `now + lead` rounded up to the slot grid; the
/// upper bound is the earlier of `now + horizon` and closing time, and
/// the closing-time slot itself is bookable. Outside opening hours, or
/// when the rounded lower bound overshoots the upper bound, checkout
/// is closed and `next_open` points at the next opening.
pub fn compute_availability(
    hours: &WeeklyHours,
    config: &PickupConfig,
    now: NaiveDateTime,
) -> Availability {
    let Some((_, close)) = hours.window_containing(now) else {
        return Availability {
            slots: Vec::new(),
            next_open: hours.next_open(now),
        };
    };
    if config.step_minutes <= 0 {
        // Degenerate grid; treat as closed rather than loop on it.
        return Availability {
            slots: Vec::new(),
            next_open: hours.next_open(now),
        };
    }

    let lower = round_up_to_step(now + Duration::minutes(config.lead_minutes), config.step_minutes);
    let upper = (now + Duration::minutes(config.horizon_minutes)).min(close);
    if lower > upper {
        // Inside the window but past the last bookable slot; today no
        // longer counts as the next opening.
        return Availability {
            slots: Vec::new(),
            next_open: hours.next_open(now + Duration::minutes(1)),
        };
    }

    let mut slots = Vec::new();
    let mut cursor = lower;
    while cursor <= upper {
        slots.push(cursor);
        cursor += Duration::minutes(config.step_minutes);
    }
    Availability {
        slots,
        next_open: None,
    }
}

/// Re-validate a chosen pickup time at submission: still within
/// lead/horizon of `now` and inside that day's opening window
/// (closing time inclusive).
pub fn is_pickup_valid(
    hours: &WeeklyHours,
    config: &PickupConfig,
    now: NaiveDateTime,
    pickup: NaiveDateTime,
) -> bool {
    if pickup < now + Duration::minutes(config.lead_minutes)
        || pickup > now + Duration::minutes(config.horizon_minutes)
    {
        return false;
    }
    for anchor in [pickup.date(), pickup.date() - Duration::days(1)] {
        if let Some((open, close)) = hours.window_on(anchor) {
            if pickup >= open && pickup <= close {
                return true;
            }
        }
    }
    false
}

/// Format a slot as "Sun 09:30" for receipts and labels.
pub fn format_day_and_time(t: NaiveDateTime) -> String {
    let day = WeeklyHours::day_name_short(t.weekday().num_days_from_sunday() as usize);
    format!("{day} {:02}:{:02}", t.hour(), t.minute())
}
