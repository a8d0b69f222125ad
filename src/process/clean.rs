use anyhow::Result;
use tracing::{debug, info, instrument};

use crate::config::CleaningConfig;
use crate::metadata::{LookupTable, Metadata, RepeatedLookup};
use crate::process::date_parser::reformat_date;
use crate::process::utils::{is_punctuation_only, is_shouting, title_case};
use crate::report::PhaseReport;
use crate::table::{is_blank, Table};

/// Apply `f` to every cell of `column`; `f` returns the replacement when it
/// wants to change the cell. Returns how many cells changed, or `None` when
/// the column is absent.
fn rewrite_column<F>(table: &mut Table, column: &str, mut f: F) -> Option<usize>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(idx) = table.column_index(column) else {
        debug!(column, "column not present, rule skipped");
        return None;
    };
    let mut changed = 0;
    for row in table.rows.iter_mut() {
        if let Some(new) = f(&row[idx]) {
            if new != row[idx] {
                row[idx] = new;
                changed += 1;
            }
        }
    }
    Some(changed)
}

pub fn strip_name_commas(table: &mut Table, column: &str, exceptions: &[String]) -> usize {
    rewrite_column(table, column, |v| {
        (v.contains(',') && !exceptions.iter().any(|e| e == v)).then(|| v.replace(',', ""))
    })
    .unwrap_or(0)
}

pub fn blank_punctuation_only(table: &mut Table, column: &str) -> usize {
    rewrite_column(table, column, |v| is_punctuation_only(v).then(String::new)).unwrap_or(0)
}

pub fn title_case_shouting(table: &mut Table, column: &str) -> usize {
    rewrite_column(table, column, |v| is_shouting(v).then(|| title_case(v))).unwrap_or(0)
}

pub fn replace_exact(table: &mut Table, column: &str, from: &str, to: &str) -> usize {
    rewrite_column(table, column, |v| (v == from).then(|| to.to_string())).unwrap_or(0)
}

/// Returns (reformatted, left unchanged because unparseable).
pub fn reformat_dates(table: &mut Table, column: &str) -> (usize, usize) {
    let mut bad = 0;
    let changed = rewrite_column(table, column, |v| {
        if is_blank(v) {
            return None;
        }
        let out = reformat_date(v);
        if out.is_none() {
            bad += 1;
        }
        out
    })
    .unwrap_or(0);
    (changed, bad)
}

/// Left join on the cell's own value. Returns the number of non-blank
/// values with no entry (now blank).
pub fn normalize_with_lookup(table: &mut Table, column: &str, lookup: &LookupTable) -> usize {
    let mut misses = 0;
    rewrite_column(table, column, |v| {
        if is_blank(v) {
            return None;
        }
        match lookup.get(v) {
            Some(clean) => Some(clean.to_string()),
            None => {
                misses += 1;
                Some(String::new())
            }
        }
    });
    misses
}

/// Overwrite `rep.column` with the hand-cleaned value found under the row's
/// key. Rows whose key has no entry end up blank. Returns the miss count.
pub fn reattach_repeated(table: &mut Table, rep: &RepeatedLookup) -> usize {
    let (Some(col), Some(key)) = (
        table.column_index(&rep.column),
        table.column_index(&rep.key_column),
    ) else {
        debug!(column = %rep.column, key = %rep.key_column, "repeated-data columns not present, skipped");
        return 0;
    };
    let mut misses = 0;
    for row in table.rows.iter_mut() {
        match rep.table.get(&row[key]) {
            Some(clean) => row[col] = clean.to_string(),
            None => {
                if !is_blank(&row[col]) {
                    misses += 1;
                }
                row[col].clear();
            }
        }
    }
    misses
}

/// Run every correction in its fixed order.
#[instrument(level = "info", skip_all)]
pub fn clean_data(
    table: &mut Table,
    cfg: &CleaningConfig,
    meta: &Metadata,
    report: &mut PhaseReport,
) -> Result<()> {
    let n = strip_name_commas(table, &cfg.last_name_column, &cfg.last_name_comma_exceptions);
    report.note(format!("Removed commas from {} last names", n));

    for col in &cfg.punctuation_only_columns {
        let n = blank_punctuation_only(table, col);
        report.note(format!("Blanked {} punctuation-only values in `{}`", n, col));
    }

    for col in &cfg.title_case_columns {
        let n = title_case_shouting(table, col);
        report.note(format!("Title-cased {} upper-case values in `{}`", n, col));
    }

    for r in &cfg.replacements {
        let n = replace_exact(table, &r.column, &r.from, &r.to);
        if n > 0 {
            report.note(format!(
                "Replaced {} x `{}` with `{}` in `{}`",
                n, r.from, r.to, r.column
            ));
        }
    }

    for col in &cfg.date_columns {
        let (n, bad) = reformat_dates(table, col);
        report.note(format!("Reformatted {} dates in `{}`", n, col));
        if bad > 0 {
            report.note(format!("{} values in `{}` are not dates, left as-is", bad, col));
        }
    }

    if let (Some(rel), Some(lookup)) = (&cfg.religion, &meta.religion) {
        let misses = normalize_with_lookup(table, &rel.column, lookup);
        report.note(format!(
            "Normalized `{}` against {} known values, {} unmatched values blanked",
            rel.column,
            lookup.len(),
            misses
        ));
    }

    for rep in &meta.repeated {
        let misses = reattach_repeated(table, rep);
        report.note(format!(
            "Re-attached cleaned `{}` by `{}`, {} rows had no cleaned value",
            rep.column, rep.key_column, misses
        ));
    }

    info!(rows = table.rows.len(), "cleaning done");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Replacement;
    use crate::table::tests::table;

    #[test]
    fn name_commas_respect_exceptions() {
        let mut t = table(
            &["Last Name"],
            &[&["Smith,"], &["F. Queen, Jr."], &["O,Neil,"], &["Jones"]],
        );
        let n = strip_name_commas(&mut t, "Last Name", &["F. Queen, Jr.".to_string()]);
        assert_eq!(n, 2);
        assert_eq!(
            t.column_values("Last Name").unwrap(),
            vec!["Smith", "F. Queen, Jr.", "ONeil", "Jones"]
        );
    }

    #[test]
    fn address_city_and_literal_fixes() {
        let mut t = table(
            &["Address 1", "City", "Home Phone"],
            &[
                &[", ", "LONDON", "0"],
                &[",", "St. Mary&#039;s Ward", "01234"],
                &["1 High St", "Leeds", ""],
            ],
        );
        assert_eq!(blank_punctuation_only(&mut t, "Address 1"), 2);
        assert_eq!(title_case_shouting(&mut t, "City"), 1);
        let fix = Replacement::new("City", "St. Mary&#039;s Ward", "St. Mary's Ward");
        assert_eq!(replace_exact(&mut t, &fix.column, &fix.from, &fix.to), 1);
        assert_eq!(replace_exact(&mut t, "Home Phone", "0", ""), 1);
        assert_eq!(replace_exact(&mut t, "Nope", "0", ""), 0);

        assert_eq!(t.column_values("Address 1").unwrap(), vec!["", "", "1 High St"]);
        assert_eq!(
            t.column_values("City").unwrap(),
            vec!["London", "St. Mary's Ward", "Leeds"]
        );
        assert_eq!(t.column_values("Home Phone").unwrap(), vec!["", "01234", ""]);
    }

    #[test]
    fn dates_are_reformatted_or_counted() {
        let mut t = table(
            &["Date of Birth"],
            &[&["2018-03-05"], &[""], &["sometime"], &["1980-12-01 00:00:00"]],
        );
        assert_eq!(reformat_dates(&mut t, "Date of Birth"), (2, 1));
        assert_eq!(
            t.column_values("Date of Birth").unwrap(),
            vec!["03/05/2018", "", "sometime", "12/01/1980"]
        );
    }

    #[test]
    fn religion_join_blanks_misses() -> anyhow::Result<()> {
        let lookup = LookupTable::from_first_two(
            &table(&["raw", "clean"], &[&["C of E", "Christian"], &["none", ""]]),
            "religion",
        )?;
        let mut t = table(&["Religion"], &[&["C of E "], &["Jedi"], &[""], &["none"]]);
        assert_eq!(normalize_with_lookup(&mut t, "Religion", &lookup), 1);
        assert_eq!(t.column_values("Religion").unwrap(), vec!["Christian", "", "", ""]);
        Ok(())
    }

    #[test]
    fn repeated_data_is_reattached_by_key() -> anyhow::Result<()> {
        let rep = RepeatedLookup {
            column: "Occupation".into(),
            key_column: "Email".into(),
            table: LookupTable::from_columns(
                &table(&["Email", "Occupation"], &[&["a@x", "Teacher"]]),
                "occupation",
                "Email",
                "Occupation",
            )?,
        };
        let mut t = table(
            &["Email", "Occupation"],
            &[&["a@x", "teacher teacher"], &["b@x", "nurse nurse"], &["c@x", ""]],
        );
        assert_eq!(reattach_repeated(&mut t, &rep), 1);
        assert_eq!(t.column_values("Occupation").unwrap(), vec!["Teacher", "", ""]);
        Ok(())
    }
}
