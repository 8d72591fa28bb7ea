//! Turning upstream payloads into catalog records.
//!
//! Everything here is pure so the rules can be tested without a network.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};

use super::types::{
    Catalog, ContestLink, NativeContest, NativeContestProblem, NativeModels, NativeProblem, StoredContest,
    StoredProblem,
};

const CONTEST_URL: &str = "https://atcoder.jp/contests";

/// Contest id prefixes that are categories of their own.
const SERIES: [&str; 4] = ["abc", "arc", "agc", "ahc"];

/// Upper bound used for "All" and open-ended rated ranges.
const OPEN_RATED_BOUND: i64 = 9999;

/// Floor for stored dates: one second after the epoch.
pub fn epoch_floor() -> DateTime<Utc> {
    DateTime::from_timestamp(1, 0).unwrap_or_default()
}

/// Leading integer of `text` after optional whitespace and sign.
fn leading_int(text: &str) -> Option<i64> {
    let text = text.trim_start();
    let (sign, digits) = match text.as_bytes().first() {
        Some(b'-') => (-1, &text[1..]),
        Some(b'+') => (1, &text[1..]),
        _ => (1, text),
    };
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse::<i64>().ok().map(|n| sign * n)
}

/// Category of a contest from its id and rated range.
///
/// Series contests use their prefix. Other contests are classified by the
/// text after the first `~` of the rated range (`"~ 1999"`,
/// `"1200 ~ 2799"`). `"All"` and a lone space after the `~` count as
/// open-ended. A range without `~`, or with nothing after it, stays in
/// `others`; text after it that does not start with a number counts as
/// `agc_like`.
pub fn category_of(id: &str, rate_change: &str) -> &'static str {
    let prefix: String = id.chars().take(3).collect();
    if let Some(series) = SERIES.into_iter().find(|s| *s == prefix) {
        return series;
    }

    let right = if rate_change == "All" { Some(" ") } else { rate_change.split('~').nth(1) };
    let upper = match right {
        None | Some("") => return "others",
        Some(" ") => Some(OPEN_RATED_BOUND),
        Some(right) => leading_int(right),
    };

    match upper {
        Some(u) if u < 2000 => "abc_like",
        Some(u) if u < 2800 => "arc_like",
        _ => "agc_like",
    }
}

/// Problems with their own id and name only.
pub fn resolve_problems(native: Vec<NativeProblem>) -> Vec<StoredProblem> {
    native
        .into_iter()
        .map(|p| StoredProblem {
            search: format!("{} {}", p.id, p.name),
            id: p.id,
            title: p.name,
            link: None,
            difficulty: None,
            date: epoch_floor(),
        })
        .collect()
}

/// Fill in estimated difficulties, rounded to integers. A zero estimate
/// counts as none.
pub fn apply_difficulties(problems: &mut [StoredProblem], models: &NativeModels) {
    for problem in problems {
        let difficulty = models.get(&problem.id).and_then(|m| m.difficulty).filter(|d| *d != 0.0);
        if let Some(difficulty) = difficulty {
            problem.difficulty = Some(difficulty.round() as i64);
        }
    }
}

pub fn resolve_contests(native: Vec<NativeContest>) -> Vec<StoredContest> {
    native
        .into_iter()
        .map(|c| StoredContest {
            category: category_of(&c.id, &c.rate_change).to_string(),
            link: Some(format!("{CONTEST_URL}/{}", c.id)),
            search: format!("{} {}", c.id, c.title),
            date: DateTime::from_timestamp(c.start_epoch_second.max(1), 0).unwrap_or_else(epoch_floor),
            id: c.id,
            title: c.title,
        })
        .collect()
}

/// Link problems to contests.
///
/// Each problem gets a task link, the date of its earliest contest, and the
/// ids and titles of its contests prepended to its search text. Links to
/// problems missing from the catalog are skipped.
pub fn link_problems(
    mut problems: Vec<StoredProblem>, contests: Vec<StoredContest>, native: Vec<NativeContestProblem>,
) -> Catalog {
    let known: HashSet<String> = problems.iter().map(|p| p.id.clone()).collect();
    let contest_info: HashMap<String, (String, DateTime<Utc>)> =
        contests.iter().map(|c| (c.id.clone(), (c.title.clone(), c.date))).collect();

    let mut links = Vec::new();
    let mut task_links: HashMap<String, String> = HashMap::new();
    let mut dates: HashMap<String, DateTime<Utc>> = HashMap::new();
    let mut searches: HashMap<String, String> = HashMap::new();

    for entry in native {
        if !known.contains(&entry.problem_id) {
            tracing::warn!(problem = %entry.problem_id, contest = %entry.contest_id, "linked problem not in catalog, skipping");
            continue;
        }
        task_links.insert(
            entry.problem_id.clone(),
            format!("{CONTEST_URL}/{}/tasks/{}", entry.contest_id, entry.problem_id),
        );
        if let Some((title, date)) = contest_info.get(&entry.contest_id) {
            dates
                .entry(entry.problem_id.clone())
                .and_modify(|d| *d = (*d).min(*date))
                .or_insert(*date);
            let search = searches.entry(entry.problem_id.clone()).or_default();
            search.push_str(&format!("{} {} ", entry.contest_id, title));
        }
        links.push(ContestLink { cid: entry.contest_id, pid: entry.problem_id, index: entry.problem_index });
    }

    for problem in &mut problems {
        problem.link = task_links.remove(&problem.id);
        if let Some(date) = dates.remove(&problem.id) {
            problem.date = date;
        }
        if let Some(prefix) = searches.remove(&problem.id) {
            problem.search = format!("{prefix}{}", problem.search);
        }
    }

    Catalog { problems, contests, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atcoder::types::NativeModel;

    fn contest(id: &str, start: i64, rate_change: &str) -> NativeContest {
        NativeContest {
            id: id.into(),
            title: format!("Contest {id}"),
            start_epoch_second: start,
            rate_change: rate_change.into(),
        }
    }

    fn problem(id: &str) -> NativeProblem {
        NativeProblem { id: id.into(), name: format!("Problem {id}") }
    }

    fn link(cid: &str, pid: &str, index: &str) -> NativeContestProblem {
        NativeContestProblem { contest_id: cid.into(), problem_id: pid.into(), problem_index: index.into() }
    }

    #[test]
    fn test_category_by_series_prefix() {
        assert_eq!(category_of("abc300", "~ 1999"), "abc");
        assert_eq!(category_of("arc150", "1200 ~ 2799"), "arc");
        assert_eq!(category_of("agc060", "1200 ~ "), "agc");
        assert_eq!(category_of("ahc020", "-"), "ahc");
    }

    #[test]
    fn test_category_by_rated_range() {
        let cases = [
            (" ~ 1999", "abc_like"),
            ("1200 ~ 1999", "abc_like"),
            (" ~ 2799", "arc_like"),
            (" ~ 2800", "agc_like"),
            ("All", "agc_like"),
            ("1200 ~ ", "agc_like"),
            ("1200 ~", "others"),
            ("-", "others"),
            ("", "others"),
            (" All", "others"),
            ("~ soon", "agc_like"),
            ("1200 ~  ", "agc_like"),
            ("~ 1999 (unrated)", "abc_like"),
            ("~ -5", "abc_like"),
            ("1200 ~ 2799 ~ 3199", "arc_like"),
        ];
        for (range, expected) in cases {
            assert_eq!(category_of("xmascon", range), expected, "rated range {range:?}");
        }
    }

    #[test]
    fn test_leading_int() {
        assert_eq!(leading_int(" 1999"), Some(1999));
        assert_eq!(leading_int("2799abc"), Some(2799));
        assert_eq!(leading_int(" -12"), Some(-12));
        assert_eq!(leading_int(" soon"), None);
        assert_eq!(leading_int(""), None);
        assert_eq!(leading_int("-"), None);
    }

    #[test]
    fn test_difficulties_rounded() {
        let mut problems = resolve_problems(vec![problem("abc001_a"), problem("abc001_b")]);
        let models: NativeModels =
            [("abc001_a".to_string(), NativeModel { difficulty: Some(-1074.6) })].into_iter().collect();
        apply_difficulties(&mut problems, &models);
        assert_eq!(problems[0].difficulty, Some(-1075));
        assert_eq!(problems[1].difficulty, None);
    }

    #[test]
    fn test_zero_difficulty_is_absent() {
        let mut problems = resolve_problems(vec![problem("abc001_a")]);
        let models: NativeModels =
            [("abc001_a".to_string(), NativeModel { difficulty: Some(0.0) })].into_iter().collect();
        apply_difficulties(&mut problems, &models);
        assert_eq!(problems[0].difficulty, None);
    }

    #[test]
    fn test_contest_dates_floor_at_one_second() {
        let contests = resolve_contests(vec![contest("abc001", 1381579200, "-"), contest("old", 0, "-")]);
        assert_eq!(contests[0].date.timestamp(), 1381579200);
        assert_eq!(contests[1].date, epoch_floor());
        assert_eq!(contests[0].link.as_deref(), Some("https://atcoder.jp/contests/abc001"));
    }

    #[test]
    fn test_link_problems() {
        let problems = resolve_problems(vec![problem("abc001_a"), problem("orphan")]);
        let contests = resolve_contests(vec![contest("abc001", 2000, "-"), contest("arc001", 1000, "-")]);
        let catalog = link_problems(
            problems,
            contests,
            vec![link("abc001", "abc001_a", "A"), link("arc001", "abc001_a", "A"), link("abc001", "ghost", "B")],
        );

        assert_eq!(catalog.links.len(), 2);
        let linked = &catalog.problems[0];
        assert_eq!(linked.date.timestamp(), 1000);
        assert_eq!(linked.link.as_deref(), Some("https://atcoder.jp/contests/arc001/tasks/abc001_a"));
        assert_eq!(
            linked.search,
            "abc001 Contest abc001 arc001 Contest arc001 abc001_a Problem abc001_a"
        );

        let orphan = &catalog.problems[1];
        assert_eq!(orphan.link, None);
        assert_eq!(orphan.date, epoch_floor());
        assert_eq!(orphan.search, "orphan Problem orphan");
    }
}
