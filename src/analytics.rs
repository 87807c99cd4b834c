use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::store::{Course, Grade, Student};

/// Score at or above which a grade counts toward the pass rate.
pub const PASSING_SCORE: f64 = 60.0;
/// Score at or above which a grade counts toward the excellent rate.
pub const EXCELLENT_SCORE: f64 = 90.0;
/// Minimum run length before a trend is reported.
pub const CONSECUTIVE_THRESHOLD: usize = 3;
/// Leaderboard cutoff.
pub const LEADERBOARD_SIZE: usize = 10;

/// Half-up 2-decimal rounding used for averages and rates:
/// `Int(100*x + 0.5) / 100`
pub fn round_off_2_decimals(x: f64) -> f64 {
    ((100.0 * x) + 0.5).floor() / 100.0
}

fn valid_scores(grades: &[Grade]) -> Vec<f64> {
    grades.iter().filter_map(|g| g.score.parse()).collect()
}

pub fn average(grades: &[Grade]) -> f64 {
    let scores = valid_scores(grades);
    if scores.is_empty() {
        return 0.0;
    }
    round_off_2_decimals(scores.iter().sum::<f64>() / scores.len() as f64)
}

pub fn highest(grades: &[Grade]) -> Option<&Grade> {
    let mut best: Option<(&Grade, f64)> = None;
    for g in grades {
        let Some(score) = g.score.parse() else {
            continue;
        };
        // Strict comparison keeps the first record on ties.
        if best.map(|(_, top)| score > top).unwrap_or(true) {
            best = Some((g, score));
        }
    }
    best.map(|(g, _)| g)
}

pub fn lowest(grades: &[Grade]) -> Option<&Grade> {
    let mut worst: Option<(&Grade, f64)> = None;
    for g in grades {
        let Some(score) = g.score.parse() else {
            continue;
        };
        if worst.map(|(_, low)| score < low).unwrap_or(true) {
            worst = Some((g, score));
        }
    }
    worst.map(|(g, _)| g)
}

pub fn count_failing(grades: &[Grade], passing_score: f64) -> usize {
    grades
        .iter()
        .filter_map(|g| g.score.parse())
        .filter(|s| *s < passing_score)
        .count()
}

pub fn median(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

pub const DISTRIBUTION_RANGES: [&str; 5] = ["0-59", "60-69", "70-79", "80-89", "90-100"];

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBucket {
    pub range: &'static str,
    pub count: usize,
}

/// Bucket counts over valid scores. Buckets are half-open except the top
/// one, which is closed at 100; counts sum to the valid-score count.
pub fn distribution(grades: &[Grade]) -> Vec<DistributionBucket> {
    let mut counts = [0usize; 5];
    for score in valid_scores(grades) {
        let idx = if score < 60.0 {
            0
        } else if score < 70.0 {
            1
        } else if score < 80.0 {
            2
        } else if score < 90.0 {
            3
        } else {
            4
        };
        counts[idx] += 1;
    }
    DISTRIBUTION_RANGES
        .into_iter()
        .zip(counts)
        .map(|(range, count)| DistributionBucket { range, count })
        .collect()
}

fn rate_at_or_above(grades: &[Grade], threshold: f64) -> f64 {
    let scores = valid_scores(grades);
    if scores.is_empty() {
        return 0.0;
    }
    let hits = scores.iter().filter(|s| **s >= threshold).count();
    round_off_2_decimals(100.0 * hits as f64 / scores.len() as f64)
}

pub fn pass_rate(grades: &[Grade]) -> f64 {
    rate_at_or_above(grades, PASSING_SCORE)
}

pub fn excellent_rate(grades: &[Grade]) -> f64 {
    rate_at_or_above(grades, EXCELLENT_SCORE)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub median: f64,
    pub pass_rate: f64,
    pub excellent_rate: f64,
    pub distribution: Vec<DistributionBucket>,
}

/// Composite statistics. Empty or all-invalid input yields the zero-valued
/// object; "no grades yet" is a steady state, not an error.
pub fn statistics(grades: &[Grade]) -> Statistics {
    let scores = valid_scores(grades);
    Statistics {
        average: average(grades),
        highest: highest(grades).and_then(|g| g.score.parse()).unwrap_or(0.0),
        lowest: lowest(grades).and_then(|g| g.score.parse()).unwrap_or(0.0),
        median: median(&scores),
        pass_rate: pass_rate(grades),
        excellent_rate: excellent_rate(grades),
        distribution: distribution(grades),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseStat {
    pub course_id: String,
    pub course_name: String,
    pub course_code: String,
    pub grades: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub failing_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentStat {
    pub student_id: String,
    pub student_name: String,
    pub student_code: String,
    pub grades: usize,
    pub average: f64,
    pub highest: f64,
    pub lowest: f64,
    pub failing_count: usize,
}

/// One entry per input course, in input order. Courses without grades get a
/// zero row so downstream views can show "no grades yet" instead of
/// dropping the course.
pub fn group_by_course(grades: &[Grade], courses: &[Course]) -> Vec<CourseStat> {
    courses
        .iter()
        .map(|course| {
            let subset: Vec<Grade> = grades
                .iter()
                .filter(|g| g.course_id == course.id)
                .cloned()
                .collect();
            CourseStat {
                course_id: course.id.clone(),
                course_name: course.name.clone(),
                course_code: course.code.clone(),
                grades: subset.len(),
                average: average(&subset),
                highest: highest(&subset).and_then(|g| g.score.parse()).unwrap_or(0.0),
                lowest: lowest(&subset).and_then(|g| g.score.parse()).unwrap_or(0.0),
                failing_count: count_failing(&subset, PASSING_SCORE),
            }
        })
        .collect()
}

/// One entry per input student, in input order, zero-grade students
/// included.
pub fn group_by_student(grades: &[Grade], students: &[Student]) -> Vec<StudentStat> {
    students
        .iter()
        .map(|student| {
            let subset: Vec<Grade> = grades
                .iter()
                .filter(|g| g.student_id == student.id)
                .cloned()
                .collect();
            StudentStat {
                student_id: student.id.clone(),
                student_name: student.name.clone(),
                student_code: student.student_id.clone(),
                grades: subset.len(),
                average: average(&subset),
                highest: highest(&subset).and_then(|g| g.score.parse()).unwrap_or(0.0),
                lowest: lowest(&subset).and_then(|g| g.score.parse()).unwrap_or(0.0),
                failing_count: count_failing(&subset, PASSING_SCORE),
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student_id: String,
    pub student_name: String,
    pub student_code: String,
    pub average: f64,
    pub grades: usize,
}

/// Top students by average. Zero-grade students are excluded; ties keep
/// the students' input order (stable sort).
pub fn leaderboard(stats: &[StudentStat]) -> Vec<LeaderboardEntry> {
    let mut ranked: Vec<&StudentStat> = stats.iter().filter(|s| s.grades > 0).collect();
    ranked.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));
    ranked
        .into_iter()
        .take(LEADERBOARD_SIZE)
        .enumerate()
        .map(|(i, s)| LeaderboardEntry {
            rank: i + 1,
            student_id: s.student_id.clone(),
            student_name: s.student_name.clone(),
            student_code: s.student_code.clone(),
            average: s.average,
            grades: s.grades,
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDifficulty {
    pub rank: usize,
    pub course_id: String,
    pub course_name: String,
    pub course_code: String,
    pub average: f64,
    pub failing_rate: i64,
    pub grades: usize,
}

/// Courses ranked ascending by average: lowest average reads as hardest.
/// The ordering is fixed, not configurable.
pub fn course_difficulty(stats: &[CourseStat]) -> Vec<CourseDifficulty> {
    let mut ranked: Vec<&CourseStat> = stats.iter().collect();
    ranked.sort_by(|a, b| a.average.partial_cmp(&b.average).unwrap_or(Ordering::Equal));
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, s)| {
            let failing_rate = if s.grades > 0 {
                (100.0 * s.failing_count as f64 / s.grades as f64).round() as i64
            } else {
                0
            };
            CourseDifficulty {
                rank: i + 1,
                course_id: s.course_id.clone(),
                course_name: s.course_name.clone(),
                course_code: s.course_code.clone(),
                average: s.average,
                failing_rate,
                grades: s.grades,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Declining,
    Improving,
    Stable,
    InsufficientData,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResult {
    pub has_warning: bool,
    pub trend: Trend,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_declines: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_increases: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recent_grades: Option<Vec<Grade>>,
}

impl TrendResult {
    fn plain(trend: Trend) -> TrendResult {
        TrendResult {
            has_warning: false,
            trend,
            consecutive_declines: None,
            consecutive_increases: None,
            recent_grades: None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::FixedOffset>> {
    chrono::DateTime::parse_from_rfc3339(raw).ok()
}

/// Length of the strict run starting at the most recent pair. `holds`
/// receives (newer, older) scores; a record without a numeric score breaks
/// the run.
fn run_length(recent: &[&Grade], holds: impl Fn(f64, f64) -> bool) -> usize {
    let mut run = 0;
    for pair in recent.windows(2) {
        let (Some(newer), Some(older)) = (pair[0].score.parse(), pair[1].score.parse()) else {
            break;
        };
        if !holds(newer, older) {
            break;
        }
        run += 1;
    }
    run
}

/// Monotonic run detection over one student's grades in one course.
///
/// A run of strictly decreasing scores walking newest to older means the
/// student has been dropping release over release; reaching the threshold
/// raises the warning. Strict inequality only: an equal pair breaks both
/// runs. Not a statistical trend test; the output is meant to read as
/// "N consecutive drops".
pub fn detect_trend(grades: &[Grade], consecutive_threshold: usize) -> TrendResult {
    if grades.len() < consecutive_threshold {
        return TrendResult::plain(Trend::InsufficientData);
    }

    // Most recent first; unparseable timestamps order last.
    let mut recent: Vec<&Grade> = grades.iter().collect();
    recent.sort_by(
        |a, b| match (parse_timestamp(&a.created_at), parse_timestamp(&b.created_at)) {
            (Some(a), Some(b)) => b.cmp(&a),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
    );

    let declines = run_length(&recent, |newer, older| newer < older);
    if declines + 1 >= consecutive_threshold {
        return TrendResult {
            has_warning: true,
            trend: Trend::Declining,
            consecutive_declines: Some(declines + 1),
            consecutive_increases: None,
            recent_grades: Some(recent[..=declines].iter().map(|g| (*g).clone()).collect()),
        };
    }

    let increases = run_length(&recent, |newer, older| newer > older);
    if increases + 1 >= consecutive_threshold {
        return TrendResult {
            has_warning: false,
            trend: Trend::Improving,
            consecutive_declines: None,
            consecutive_increases: Some(increases + 1),
            recent_grades: Some(recent[..=increases].iter().map(|g| (*g).clone()).collect()),
        };
    }

    TrendResult::plain(Trend::Stable)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendWarning {
    pub student_id: String,
    pub student_name: String,
    pub course_id: String,
    pub course_name: String,
    #[serde(flatten)]
    pub result: TrendResult,
}

/// Trend sweep over every (student, course) pair with enough grades.
/// Grades are grouped once up front; the observable output matches the
/// naive per-pair scan, ordered students-outer, courses-inner.
pub fn analyze_all_trends(
    grades: &[Grade],
    students: &[Student],
    courses: &[Course],
    consecutive_threshold: usize,
) -> Vec<TrendWarning> {
    let mut by_pair: HashMap<(&str, &str), Vec<Grade>> = HashMap::new();
    for g in grades {
        by_pair
            .entry((g.student_id.as_str(), g.course_id.as_str()))
            .or_default()
            .push(g.clone());
    }

    let mut warnings = Vec::new();
    for student in students {
        for course in courses {
            let Some(pair_grades) = by_pair.get(&(student.id.as_str(), course.id.as_str()))
            else {
                continue;
            };
            if pair_grades.len() < consecutive_threshold {
                continue;
            }
            let result = detect_trend(pair_grades, consecutive_threshold);
            if result.has_warning {
                warnings.push(TrendWarning {
                    student_id: student.id.clone(),
                    student_name: student.name.clone(),
                    course_id: course.id.clone(),
                    course_name: course.name.clone(),
                    result,
                });
            }
        }
    }
    warnings
}
