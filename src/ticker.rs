//! Kalshi ticker parsing: extracts game date and teams from a market ticker.
//!
//! Example: `MONEYLINE-26JAN06DALSAC-SAC` -> date 2026-01-06, away DAL, home SAC.

use chrono::NaiveDate;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedGameCode {
    pub date: NaiveDate,
    pub away_team: String,
    pub home_team: String,
}

/// Maps a small set of non-standard codes onto the canonical abbreviation
/// used by the sports provider (e.g. Golden State appears as `GSC` on some
/// exchange tickers but `GSW` everywhere else).
fn normalize_team_code(code: &str) -> String {
    match code {
        "GSC" => "GSW".to_string(),
        other => other.to_string(),
    }
}

fn month_from_abbr(abbr: &str) -> Option<u32> {
    Some(match abbr.to_ascii_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    })
}

/// Parses the `<YY><MON><DD><AWAY><HOME>` segment embedded in a ticker,
/// e.g. `26JAN06DALSAC`.
pub fn parse_game_code(segment: &str) -> Result<ParsedGameCode> {
    if segment.len() < 7 + 6 {
        return Err(EngineError::BadInput(format!(
            "ticker segment too short: {segment}"
        )));
    }
    let (date_part, teams_part) = segment.split_at(7);
    if teams_part.len() != 6 {
        return Err(EngineError::BadInput(format!(
            "expected 6 team chars, got {}: {teams_part}",
            teams_part.len()
        )));
    }

    let yy = &date_part[0..2];
    let mon = &date_part[2..5];
    let dd = &date_part[5..7];

    let year: i32 = yy
        .parse()
        .map_err(|_| EngineError::BadInput(format!("invalid year in {date_part}")))?;
    let month = month_from_abbr(mon)
        .ok_or_else(|| EngineError::BadInput(format!("invalid month in {date_part}")))?;
    let day: u32 = dd
        .parse()
        .map_err(|_| EngineError::BadInput(format!("invalid day in {date_part}")))?;

    let date = NaiveDate::from_ymd_opt(2000 + year, month, day)
        .ok_or_else(|| EngineError::BadInput(format!("invalid date in {date_part}")))?;

    let away_team = normalize_team_code(&teams_part[0..3]);
    let home_team = normalize_team_code(&teams_part[3..6]);

    Ok(ParsedGameCode {
        date,
        away_team,
        home_team,
    })
}

/// Extracts the trailing suffix after the final hyphen of a ticker, e.g.
/// the `SAC` in `MONEYLINE-26JAN06DALSAC-SAC`, used by strategies to match
/// a per-team market against the home/away team code.
pub fn team_suffix(ticker: &str) -> &str {
    ticker.rsplit('-').next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_standard_game_code() {
        let parsed = parse_game_code("26JAN06DALSAC").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2026, 1, 6).unwrap());
        assert_eq!(parsed.away_team, "DAL");
        assert_eq!(parsed.home_team, "SAC");
    }

    #[test]
    fn rejects_invalid_month() {
        assert!(parse_game_code("26XXX06DALSAC").is_err());
    }

    #[test]
    fn rejects_short_segment() {
        assert!(parse_game_code("26JAN06DAL").is_err());
    }

    #[test]
    fn team_suffix_extracts_trailing_segment() {
        assert_eq!(team_suffix("MONEYLINE-26JAN06DALSAC-SAC"), "SAC");
    }
}
