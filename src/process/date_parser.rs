use chrono::NaiveDate;

/// `"YYYY-MM-DD..."` → `"MM/DD/YYYY"`, reading fixed offsets 0..4, 5..7 and
/// 8..10. Anything after the day (a time, a zone) is discarded. Returns
/// `None` when the slices do not form a calendar date.
pub fn reformat_date(s: &str) -> Option<String> {
    let s = s.trim();
    if s.len() < 10 || !s.is_char_boundary(10) {
        return None;
    }
    let year: i32 = s.get(0..4)?.parse().ok()?;
    let month: u32 = s.get(5..7)?.parse().ok()?;
    let day: u32 = s.get(8..10)?.parse().ok()?;

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.format("%m/%d/%Y").to_string())
}
