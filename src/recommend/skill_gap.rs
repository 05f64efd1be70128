//! スキルギャップ計算。
//!
//! Career skill names are normalised and matched against the assessed skill
//! keys, first directly and then through a fixed alias table. Only exact matches
//! count; the table is scanned in order so the result never depends on map
//! iteration order.

use std::collections::BTreeMap;

use crate::profile::{SKILL_DIM, SKILL_NAMES, SKILL_OFFSET};

/// Level assumed for every skill a career lists.
pub const REQUIRED_LEVEL: f64 = 0.8;
/// Gaps at or below this are not reported.
pub const GAP_THRESHOLD: f64 = 0.1;

/// Assessed skill key and the career-side spellings that map to it.
const ALIASES: [(&str, &[&str]); SKILL_DIM] = [
    (
        "programming",
        &[
            "programming",
            "coding",
            "python",
            "java",
            "javascript",
            "software development",
            "development",
        ],
    ),
    (
        "problem_solving",
        &[
            "problem solving",
            "algorithms",
            "data structures",
            "logical thinking",
            "critical thinking",
        ],
    ),
    (
        "communication",
        &[
            "communication",
            "writing",
            "verbal communication",
            "presentation",
            "interpersonal",
            "people skills",
            "patience",
            "teaching",
            "subject knowledge",
            "people",
        ],
    ),
    (
        "creativity",
        &[
            "creativity",
            "creative",
            "innovation",
            "creative thinking",
            "content creation",
            "content",
        ],
    ),
    (
        "leadership",
        &[
            "leadership",
            "management",
            "team management",
            "organization",
            "organizational",
            "strategy",
            "strategic",
            "organizing",
        ],
    ),
    (
        "analytical",
        &[
            "analytical",
            "analytical thinking",
            "data analysis",
            "machine learning",
            "analytics",
            "statistical analysis",
            "marketing",
            "market",
        ],
    ),
    ("mathematics", &["mathematics", "math", "statistics", "quantitative"]),
    ("design", &["design", "prototyping", "ui/ux", "user experience", "ux"]),
    (
        "research",
        &["research", "user research", "data research", "psychology", "empathy", "psychological"],
    ),
    (
        "teamwork",
        &["teamwork", "team work", "collaboration", "working in teams", "collaborative"],
    ),
];

/// Lowercases, trims and maps space, `-` and `/` to `_`.
#[must_use]
pub fn normalize_skill_name(name: &str) -> String {
    name.trim()
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, ' ' | '-' | '/') { '_' } else { c })
        .collect()
}

/// Assessed skill key for a career skill name, if any.
#[must_use]
pub fn match_user_skill<'a>(
    career_skill: &str,
    user_skills: &'a BTreeMap<String, f64>,
) -> Option<&'a str> {
    let normalized = normalize_skill_name(career_skill);
    if let Some((key, _)) = user_skills.get_key_value(&normalized) {
        return Some(key.as_str());
    }
    ALIASES
        .iter()
        .filter(|(_, aliases)| {
            aliases
                .iter()
                .any(|alias| normalize_skill_name(alias) == normalized)
        })
        .find_map(|(key, _)| user_skills.get_key_value(*key).map(|(k, _)| k.as_str()))
}

/// Gap per listed career skill: `clamp(required - user, 0, 1)`, rounded to two
/// decimals. Unmatched skills are treated as not assessed and omitted.
#[must_use]
pub fn skill_gaps(
    user_skills: &BTreeMap<String, f64>,
    career_skills: &[String],
) -> BTreeMap<String, f64> {
    let mut gaps = BTreeMap::new();
    if user_skills.is_empty() {
        tracing::warn!("no assessed skills; skill gaps cannot be computed");
        return gaps;
    }
    for skill in career_skills {
        let Some(key) = match_user_skill(skill, user_skills) else {
            continue;
        };
        let user_level = user_skills.get(key).copied().unwrap_or_default();
        let gap = (REQUIRED_LEVEL - user_level).clamp(0.0, 1.0);
        if gap > GAP_THRESHOLD {
            gaps.insert(skill.clone(), (gap * 100.0).round() / 100.0);
        }
    }
    gaps
}

/// Skill levels read from a combined vector. Short vectors yield all zeros.
#[must_use]
pub fn skills_from_vector(vector: &[f64]) -> BTreeMap<String, f64> {
    let block = vector.get(SKILL_OFFSET..SKILL_OFFSET + SKILL_DIM);
    SKILL_NAMES
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let level = block.map_or(0.0, |values| values[idx]);
            ((*name).to_string(), level)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn user(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[rstest]
    #[case("Problem Solving", Some("problem_solving"))]
    #[case("Machine Learning", Some("analytical"))]
    #[case("UI/UX", Some("design"))]
    #[case("Python", Some("programming"))]
    #[case("Team-Work", Some("teamwork"))]
    #[case("Underwater Welding", None)]
    #[case("Data", None)]
    fn matches_only_exact_aliases(#[case] career_skill: &str, #[case] expected: Option<&str>) {
        let skills = skills_from_vector(&[0.5; 20]);
        assert_eq!(match_user_skill(career_skill, &skills), expected);
    }

    #[test]
    fn teaching_career_gaps() {
        let skills = user(&[("communication", 0.25), ("research", 0.25)]);
        let career: Vec<String> = ["Communication", "Patience", "Teaching", "Empathy", "Carpentry"]
            .iter()
            .map(ToString::to_string)
            .collect();

        let gaps = skill_gaps(&skills, &career);

        assert_eq!(gaps.len(), 4);
        assert_eq!(gaps["Communication"], 0.55);
        assert_eq!(gaps["Empathy"], 0.55);
        assert!(!gaps.contains_key("Carpentry"));
    }

    #[test]
    fn small_gaps_are_dropped() {
        let skills = user(&[("programming", 0.75)]);
        let gaps = skill_gaps(&skills, &["Programming".to_string()]);
        assert!(gaps.is_empty());
    }

    #[test]
    fn empty_user_skills_yield_no_gaps() {
        let gaps = skill_gaps(&BTreeMap::new(), &["Programming".to_string()]);
        assert!(gaps.is_empty());
    }

    #[test]
    fn vector_extraction_reads_skill_block() {
        let mut vector = vec![0.0; 20];
        vector[SKILL_OFFSET] = 0.9;
        vector[SKILL_OFFSET + 9] = 0.3;
        let skills = skills_from_vector(&vector);
        assert_eq!(skills["programming"], 0.9);
        assert_eq!(skills["teamwork"], 0.3);

        let short = skills_from_vector(&[1.0; 6]);
        assert_eq!(short.len(), SKILL_DIM);
        assert!(short.values().all(|v| *v == 0.0));
    }
}
